use std::collections::BTreeMap;

use common::error::{AppError, Res};

use super::builder::{ColumnDef, ForeignKeyDef, IndexDef, Operation};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    pub columns: BTreeMap<String, ColumnDef>,
    pub indexes: BTreeMap<String, IndexDef>,
    pub foreign_keys: BTreeMap<String, ForeignKeyDef>,
}

/// In-memory model of the schema the migrations build.
///
/// Applying an operation validates it against the current model first, so a
/// migration plan can be checked before any DDL reaches the database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, TableSnapshot>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.get(name)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.table(table)
            .is_some_and(|t| t.columns.contains_key(column))
    }

    pub fn has_index(&self, table: &str, index: &str) -> bool {
        self.table(table).is_some_and(|t| t.indexes.contains_key(index))
    }

    pub fn has_foreign_key(&self, table: &str, name: &str) -> bool {
        self.table(table)
            .is_some_and(|t| t.foreign_keys.contains_key(name))
    }

    pub fn apply_all<'a>(&mut self, operations: impl IntoIterator<Item = &'a Operation>) -> Res<()> {
        operations.into_iter().try_for_each(|op| self.apply(op))
    }

    pub fn apply(&mut self, operation: &Operation) -> Res<()> {
        match operation {
            Operation::CreateTable { name, columns } => {
                if self.tables.contains_key(name) {
                    return Err(invalid(format!("table {} already exists", name)));
                }
                let mut table = TableSnapshot::default();
                for column in columns {
                    if table
                        .columns
                        .insert(column.name.clone(), column.clone())
                        .is_some()
                    {
                        return Err(invalid(format!(
                            "column {}.{} declared twice",
                            name, column.name
                        )));
                    }
                }
                self.tables.insert(name.clone(), table);
            }
            Operation::DropTable { name } => {
                self.existing_table(name)?;
                if let Some(fk) = self.referencing_keys(name, None).next() {
                    return Err(invalid(format!(
                        "table {} is still referenced by {}",
                        name, fk.name
                    )));
                }
                self.tables.remove(name);
            }
            Operation::AddColumn { table, column } => {
                let t = self.existing_table_mut(table)?;
                if t.columns.contains_key(&column.name) {
                    return Err(invalid(format!(
                        "column {}.{} already exists",
                        table, column.name
                    )));
                }
                t.columns.insert(column.name.clone(), column.clone());
            }
            Operation::DropColumn { table, column } => {
                let t = self.existing_table(table)?;
                if !t.columns.contains_key(column) {
                    return Err(invalid(format!("column {}.{} does not exist", table, column)));
                }
                if let Some(index) = t.indexes.values().find(|i| i.columns.contains(column)) {
                    return Err(invalid(format!(
                        "column {}.{} is still used by index {}",
                        table, column, index.name
                    )));
                }
                if let Some(fk) = t.foreign_keys.values().find(|fk| &fk.column == column) {
                    return Err(invalid(format!(
                        "column {}.{} is still used by {}",
                        table, column, fk.name
                    )));
                }
                if let Some(fk) = self.referencing_keys(table, Some(column)).next() {
                    return Err(invalid(format!(
                        "column {}.{} is still referenced by {}",
                        table, column, fk.name
                    )));
                }
                self.existing_table_mut(table)?.columns.remove(column);
            }
            Operation::CreateIndex(index) => {
                if self
                    .tables
                    .values()
                    .any(|t| t.indexes.contains_key(&index.name))
                {
                    return Err(invalid(format!("index {} already exists", index.name)));
                }
                let t = self.existing_table_mut(&index.table)?;
                if let Some(missing) = index.columns.iter().find(|c| !t.columns.contains_key(*c)) {
                    return Err(invalid(format!(
                        "index {} names missing column {}.{}",
                        index.name, index.table, missing
                    )));
                }
                t.indexes.insert(index.name.clone(), index.clone());
            }
            Operation::DropIndex { name, table } => {
                if self.existing_table_mut(table)?.indexes.remove(name).is_none() {
                    return Err(invalid(format!("index {} does not exist on {}", name, table)));
                }
            }
            Operation::AddForeignKey(fk) => {
                let principal = self.tables.get(&fk.principal_table).ok_or_else(|| {
                    invalid(format!(
                        "{} references missing table {}",
                        fk.name, fk.principal_table
                    ))
                })?;
                let target = principal.columns.get(&fk.principal_column).ok_or_else(|| {
                    invalid(format!(
                        "{} references missing column {}.{}",
                        fk.name, fk.principal_table, fk.principal_column
                    ))
                })?;
                if !(target.primary_key || target.unique) {
                    return Err(invalid(format!(
                        "{} references non-unique column {}.{}",
                        fk.name, fk.principal_table, fk.principal_column
                    )));
                }
                let t = self.existing_table_mut(&fk.table)?;
                if !t.columns.contains_key(&fk.column) {
                    return Err(invalid(format!(
                        "{} names missing column {}.{}",
                        fk.name, fk.table, fk.column
                    )));
                }
                if t.foreign_keys.contains_key(&fk.name) {
                    return Err(invalid(format!("constraint {} already exists", fk.name)));
                }
                t.foreign_keys.insert(fk.name.clone(), fk.clone());
            }
            Operation::DropForeignKey { name, table } => {
                if self
                    .existing_table_mut(table)?
                    .foreign_keys
                    .remove(name)
                    .is_none()
                {
                    return Err(invalid(format!(
                        "constraint {} does not exist on {}",
                        name, table
                    )));
                }
            }
        }
        Ok(())
    }

    /// Foreign keys in other tables pointing at `table` (optionally at one column).
    fn referencing_keys<'a>(
        &'a self,
        table: &'a str,
        column: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ForeignKeyDef> + 'a {
        self.tables
            .iter()
            .filter(move |(name, _)| name.as_str() != table)
            .flat_map(|(_, t)| t.foreign_keys.values())
            .filter(move |fk| {
                fk.principal_table == table
                    && column.is_none_or(|c| fk.principal_column == c)
            })
    }

    fn existing_table(&self, name: &str) -> Res<&TableSnapshot> {
        self.tables
            .get(name)
            .ok_or_else(|| invalid(format!("table {} does not exist", name)))
    }

    fn existing_table_mut(&mut self, name: &str) -> Res<&mut TableSnapshot> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| invalid(format!("table {} does not exist", name)))
    }
}

fn invalid(message: String) -> AppError {
    AppError::Migration(message)
}
