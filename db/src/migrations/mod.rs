//! Declarative, reversible schema migrations.
//!
//! A migration records its `up` and `down` operations on a [`MigrationBuilder`].
//! The [`Migrator`] validates the whole plan against a [`SchemaSnapshot`] and
//! then applies each pending migration inside its own transaction.

pub mod builder;
pub mod m20231101_initial_catalog;
pub mod m20231115_foreign_company;
pub mod runner;
pub mod snapshot;

pub use builder::{MigrationBuilder, Operation};
pub use runner::Migrator;
pub use snapshot::SchemaSnapshot;

pub trait Migration: Send + Sync {
    /// Unique, sortable identifier recorded in the history table.
    fn id(&self) -> &'static str;

    fn up(&self, builder: &mut MigrationBuilder);

    /// Must undo `up` exactly, in reverse order.
    fn down(&self, builder: &mut MigrationBuilder);

    fn up_operations(&self) -> Vec<Operation> {
        let mut builder = MigrationBuilder::new();
        self.up(&mut builder);
        builder.into_operations()
    }

    fn down_operations(&self) -> Vec<Operation> {
        let mut builder = MigrationBuilder::new();
        self.down(&mut builder);
        builder.into_operations()
    }
}

/// Every storefront migration, oldest first.
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(m20231101_initial_catalog::InitialCatalog),
        Box::new(m20231115_foreign_company::ForeignCompany),
    ]
}
