use super::{
    Migration,
    builder::{
        ColumnDef, ColumnType, MigrationBuilder, ReferentialAction, foreign_key_name, index_name,
    },
};

/// Catalog, identity, cart and order tables.
pub struct InitialCatalog;

/// (table, column, principal table) for every cascading reference created here.
const REFERENCES: [(&str, &str, &str); 8] = [
    ("products", "category_id", "categories"),
    ("user_roles", "user_id", "users"),
    ("user_roles", "role_id", "roles"),
    ("shopping_carts", "product_id", "products"),
    ("shopping_carts", "application_user_id", "users"),
    ("order_headers", "application_user_id", "users"),
    ("order_details", "order_header_id", "order_headers"),
    ("order_details", "product_id", "products"),
];

/// Drop order: dependents before the tables they reference.
const TABLES_DEPENDENTS_FIRST: [&str; 9] = [
    "order_details",
    "order_headers",
    "shopping_carts",
    "user_roles",
    "roles",
    "users",
    "products",
    "categories",
    "companies",
];

fn id() -> ColumnDef {
    ColumnDef::new("id", ColumnType::Serial).primary_key()
}

fn text(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Text)
}

fn optional_text(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Text).nullable()
}

impl Migration for InitialCatalog {
    fn id(&self) -> &'static str {
        "20231101000000_initial_catalog"
    }

    fn up(&self, builder: &mut MigrationBuilder) {
        builder.create_table(
            "categories",
            vec![
                id(),
                ColumnDef::new("name", ColumnType::Varchar(30)),
                ColumnDef::new("display_order", ColumnType::Integer),
            ],
        );

        builder.create_table(
            "products",
            vec![
                id(),
                text("title"),
                optional_text("description"),
                text("isbn"),
                text("author"),
                ColumnDef::new("list_price", ColumnType::Double),
                ColumnDef::new("price", ColumnType::Double),
                ColumnDef::new("price50", ColumnType::Double),
                ColumnDef::new("price100", ColumnType::Double),
                ColumnDef::new("category_id", ColumnType::Integer),
                optional_text("image_url"),
            ],
        );

        builder.create_table(
            "companies",
            vec![
                id(),
                text("name"),
                optional_text("street_address"),
                optional_text("city"),
                optional_text("state"),
                optional_text("postal_code"),
                optional_text("phone_number"),
            ],
        );

        builder.create_table(
            "users",
            vec![
                ColumnDef::new("id", ColumnType::Uuid).primary_key(),
                ColumnDef::new("email", ColumnType::Varchar(256)),
                ColumnDef::new("normalized_email", ColumnType::Varchar(256)),
                text("password_hash"),
                text("security_stamp"),
                ColumnDef::new("email_confirmed", ColumnType::Boolean).default_sql("FALSE"),
                text("name"),
                optional_text("street_address"),
                optional_text("city"),
                optional_text("state"),
                optional_text("postal_code"),
                optional_text("phone_number"),
                ColumnDef::new("created_at", ColumnType::Timestamp).default_sql("now()"),
            ],
        );
        builder.create_unique_index("ix_users_normalized_email", "users", &["normalized_email"]);

        builder.create_table(
            "roles",
            vec![id(), ColumnDef::new("name", ColumnType::Varchar(64)).unique()],
        );

        builder.create_table(
            "user_roles",
            vec![
                id(),
                ColumnDef::new("user_id", ColumnType::Uuid),
                ColumnDef::new("role_id", ColumnType::Integer),
            ],
        );
        builder.create_unique_index(
            "ix_user_roles_user_id_role_id",
            "user_roles",
            &["user_id", "role_id"],
        );

        builder.create_table(
            "shopping_carts",
            vec![
                id(),
                ColumnDef::new("product_id", ColumnType::Integer),
                ColumnDef::new("count", ColumnType::Integer),
                ColumnDef::new("application_user_id", ColumnType::Uuid),
            ],
        );

        builder.create_table(
            "order_headers",
            vec![
                id(),
                ColumnDef::new("application_user_id", ColumnType::Uuid),
                ColumnDef::new("order_date", ColumnType::Timestamp),
                ColumnDef::new("shipping_date", ColumnType::Timestamp).nullable(),
                ColumnDef::new("order_total", ColumnType::Double),
                optional_text("order_status"),
                optional_text("payment_status"),
                optional_text("tracking_number"),
                optional_text("carrier"),
                ColumnDef::new("payment_date", ColumnType::Timestamp).nullable(),
                ColumnDef::new("payment_due_date", ColumnType::Timestamp).nullable(),
                optional_text("session_id"),
                optional_text("payment_intent_id"),
                text("phone_number"),
                text("street_address"),
                text("city"),
                text("state"),
                text("postal_code"),
                text("name"),
            ],
        );

        builder.create_table(
            "order_details",
            vec![
                id(),
                ColumnDef::new("order_header_id", ColumnType::Integer),
                ColumnDef::new("product_id", ColumnType::Integer),
                ColumnDef::new("count", ColumnType::Integer),
                ColumnDef::new("price", ColumnType::Double),
            ],
        );

        for (table, column, principal) in REFERENCES {
            builder.create_index(&index_name(table, column), table, &[column]);
            builder.add_foreign_key(
                &foreign_key_name(table, principal, column),
                table,
                column,
                principal,
                "id",
                ReferentialAction::Cascade,
            );
        }
    }

    fn down(&self, builder: &mut MigrationBuilder) {
        for table in TABLES_DEPENDENTS_FIRST {
            builder.drop_table(table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::snapshot::SchemaSnapshot;

    #[test]
    fn creates_every_table_with_cascading_keys() {
        let mut snapshot = SchemaSnapshot::new();
        snapshot.apply_all(&InitialCatalog.up_operations()).unwrap();

        for table in TABLES_DEPENDENTS_FIRST {
            assert!(snapshot.table(table).is_some(), "missing {table}");
        }
        assert!(snapshot.has_foreign_key(
            "order_details",
            "fk_order_details_order_headers_order_header_id"
        ));
        assert!(!snapshot.has_column("users", "company_id"));
    }

    #[test]
    fn down_after_up_leaves_an_empty_schema() {
        let mut snapshot = SchemaSnapshot::new();
        snapshot.apply_all(&InitialCatalog.up_operations()).unwrap();
        snapshot
            .apply_all(&InitialCatalog.down_operations())
            .unwrap();
        assert_eq!(snapshot, SchemaSnapshot::new());
    }
}
