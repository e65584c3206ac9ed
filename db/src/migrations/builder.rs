use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Serial,
    Integer,
    Text,
    Varchar(u16),
    Boolean,
    Double,
    Uuid,
    Timestamp,
}

impl ColumnType {
    fn sql(&self) -> String {
        match self {
            ColumnType::Serial => "SERIAL".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Varchar(len) => format!("VARCHAR({})", len),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Double => "DOUBLE PRECISION".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Timestamp => "TIMESTAMPTZ".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<String>,
}

impl ColumnDef {
    /// A `NOT NULL` column.
    pub fn new(name: &str, ty: ColumnType) -> Self {
        ColumnDef {
            name: name.to_string(),
            ty,
            nullable: false,
            primary_key: false,
            unique: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Raw SQL default expression, e.g. `now()` or `FALSE`.
    pub fn default_sql(mut self, expr: &str) -> Self {
        self.default = Some(expr.to_string());
        self
    }

    fn sql(&self) -> String {
        let mut sql = format!("{} {}", ident(&self.name), self.ty.sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        } else {
            sql.push_str(" NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub name: String,
    pub table: String,
    pub column: String,
    pub principal_table: String,
    pub principal_column: String,
    pub on_delete: ReferentialAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// One schema change. Each operation renders to exactly one DDL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateTable { name: String, columns: Vec<ColumnDef> },
    DropTable { name: String },
    AddColumn { table: String, column: ColumnDef },
    DropColumn { table: String, column: String },
    CreateIndex(IndexDef),
    DropIndex { name: String, table: String },
    AddForeignKey(ForeignKeyDef),
    DropForeignKey { name: String, table: String },
}

impl Operation {
    /// PostgreSQL DDL for this operation. No `IF [NOT] EXISTS` guards: a
    /// repeated operation fails in the database.
    pub fn to_sql(&self) -> String {
        match self {
            Operation::CreateTable { name, columns } => format!(
                "CREATE TABLE {} ({})",
                ident(name),
                columns
                    .iter()
                    .map(ColumnDef::sql)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Operation::DropTable { name } => format!("DROP TABLE {}", ident(name)),
            Operation::AddColumn { table, column } => {
                format!("ALTER TABLE {} ADD COLUMN {}", ident(table), column.sql())
            }
            Operation::DropColumn { table, column } => {
                format!("ALTER TABLE {} DROP COLUMN {}", ident(table), ident(column))
            }
            Operation::CreateIndex(index) => format!(
                "CREATE {}INDEX {} ON {} ({})",
                if index.unique { "UNIQUE " } else { "" },
                ident(&index.name),
                ident(&index.table),
                index
                    .columns
                    .iter()
                    .map(|c| ident(c))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Operation::DropIndex { name, .. } => format!("DROP INDEX {}", ident(name)),
            Operation::AddForeignKey(fk) => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
                ident(&fk.table),
                ident(&fk.name),
                ident(&fk.column),
                ident(&fk.principal_table),
                ident(&fk.principal_column),
                fk.on_delete
            ),
            Operation::DropForeignKey { name, table } => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                ident(table),
                ident(name)
            ),
        }
    }
}

/// Index name for a single-column index: `ix_<table>_<column>`.
pub fn index_name(table: &str, column: &str) -> String {
    format!("ix_{}_{}", table, column)
}

/// Constraint name for a foreign key: `fk_<table>_<principal>_<column>`.
pub fn foreign_key_name(table: &str, principal_table: &str, column: &str) -> String {
    format!("fk_{}_{}_{}", table, principal_table, column)
}

fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Records the operations of one migration direction, in call order.
#[derive(Debug, Default)]
pub struct MigrationBuilder {
    operations: Vec<Operation>,
}

impl MigrationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnDef>) -> &mut Self {
        self.operations.push(Operation::CreateTable {
            name: name.to_string(),
            columns,
        });
        self
    }

    pub fn drop_table(&mut self, name: &str) -> &mut Self {
        self.operations.push(Operation::DropTable {
            name: name.to_string(),
        });
        self
    }

    pub fn add_column(&mut self, table: &str, column: ColumnDef) -> &mut Self {
        self.operations.push(Operation::AddColumn {
            table: table.to_string(),
            column,
        });
        self
    }

    pub fn drop_column(&mut self, name: &str, table: &str) -> &mut Self {
        self.operations.push(Operation::DropColumn {
            table: table.to_string(),
            column: name.to_string(),
        });
        self
    }

    pub fn create_index(&mut self, name: &str, table: &str, columns: &[&str]) -> &mut Self {
        self.push_index(name, table, columns, false)
    }

    pub fn create_unique_index(&mut self, name: &str, table: &str, columns: &[&str]) -> &mut Self {
        self.push_index(name, table, columns, true)
    }

    fn push_index(&mut self, name: &str, table: &str, columns: &[&str], unique: bool) -> &mut Self {
        self.operations.push(Operation::CreateIndex(IndexDef {
            name: name.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        }));
        self
    }

    pub fn drop_index(&mut self, name: &str, table: &str) -> &mut Self {
        self.operations.push(Operation::DropIndex {
            name: name.to_string(),
            table: table.to_string(),
        });
        self
    }

    pub fn add_foreign_key(
        &mut self,
        name: &str,
        table: &str,
        column: &str,
        principal_table: &str,
        principal_column: &str,
        on_delete: ReferentialAction,
    ) -> &mut Self {
        self.operations.push(Operation::AddForeignKey(ForeignKeyDef {
            name: name.to_string(),
            table: table.to_string(),
            column: column.to_string(),
            principal_table: principal_table.to_string(),
            principal_column: principal_column.to_string(),
            on_delete,
        }));
        self
    }

    pub fn drop_foreign_key(&mut self, name: &str, table: &str) -> &mut Self {
        self.operations.push(Operation::DropForeignKey {
            name: name.to_string(),
            table: table.to_string(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_column_renders_without_not_null() {
        let op = Operation::AddColumn {
            table: "users".into(),
            column: ColumnDef::new("company_id", ColumnType::Integer).nullable(),
        };
        assert_eq!(
            op.to_sql(),
            r#"ALTER TABLE "users" ADD COLUMN "company_id" INTEGER NULL"#
        );
    }

    #[test]
    fn foreign_key_renders_referential_action() {
        let mut builder = MigrationBuilder::new();
        builder.add_foreign_key(
            "fk_users_companies_company_id",
            "users",
            "company_id",
            "companies",
            "id",
            ReferentialAction::Cascade,
        );
        assert_eq!(
            builder.operations()[0].to_sql(),
            r#"ALTER TABLE "users" ADD CONSTRAINT "fk_users_companies_company_id" FOREIGN KEY ("company_id") REFERENCES "companies" ("id") ON DELETE CASCADE"#
        );
    }

    #[test]
    fn create_table_lists_columns_in_order() {
        let op = Operation::CreateTable {
            name: "roles".into(),
            columns: vec![
                ColumnDef::new("id", ColumnType::Serial).primary_key(),
                ColumnDef::new("name", ColumnType::Varchar(64)).unique(),
                ColumnDef::new("created_at", ColumnType::Timestamp).default_sql("now()"),
            ],
        };
        assert_eq!(
            op.to_sql(),
            r#"CREATE TABLE "roles" ("id" SERIAL PRIMARY KEY, "name" VARCHAR(64) NOT NULL UNIQUE, "created_at" TIMESTAMPTZ NOT NULL DEFAULT now())"#
        );
    }

    #[test]
    fn naming_helpers_follow_convention() {
        assert_eq!(index_name("users", "company_id"), "ix_users_company_id");
        assert_eq!(
            foreign_key_name("users", "companies", "company_id"),
            "fk_users_companies_company_id"
        );
    }

    #[test]
    fn identifiers_are_quoted() {
        let op = Operation::DropIndex {
            name: "ix_\"odd\"".into(),
            table: "users".into(),
        };
        assert_eq!(op.to_sql(), r#"DROP INDEX "ix_""odd""""#);
    }
}
