use super::{
    Migration,
    builder::{ColumnDef, ColumnType, MigrationBuilder, ReferentialAction},
};

pub const USERS: &str = "users";
pub const COMPANIES: &str = "companies";
pub const COMPANY_ID: &str = "company_id";
// Names carried over from the deployed identity schema; quoted, so case is kept.
pub const IX_USERS_COMPANY_ID: &str = "IX_AspNetUsers_CompanyID";
pub const FK_USERS_COMPANIES_COMPANY_ID: &str = "FK_AspNetUsers_Companies_CompanyID";

/// Links users to the company that owns their account.
pub struct ForeignCompany;

impl Migration for ForeignCompany {
    fn id(&self) -> &'static str {
        "20231115055236_foreign_company"
    }

    fn up(&self, builder: &mut MigrationBuilder) {
        builder.add_column(
            USERS,
            ColumnDef::new(COMPANY_ID, ColumnType::Integer).nullable(),
        );

        builder.create_index(IX_USERS_COMPANY_ID, USERS, &[COMPANY_ID]);

        builder.add_foreign_key(
            FK_USERS_COMPANIES_COMPANY_ID,
            USERS,
            COMPANY_ID,
            COMPANIES,
            "id",
            ReferentialAction::Cascade,
        );
    }

    fn down(&self, builder: &mut MigrationBuilder) {
        builder.drop_foreign_key(FK_USERS_COMPANIES_COMPANY_ID, USERS);

        builder.drop_index(IX_USERS_COMPANY_ID, USERS);

        builder.drop_column(COMPANY_ID, USERS);
    }
}
