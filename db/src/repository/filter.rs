use common::error::{AppError, Res};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i32),
    BigInt(i64),
    Text(String),
    Uuid(Uuid),
    Bool(bool),
    Null,
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Int(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::BigInt(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::Uuid(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FilterValue::Null, Into::into)
    }
}

/// Conjunction of `column = value` and `column IS NULL` conditions.
///
/// Column names are checked against the entity's column list before any SQL
/// is built; values are always sent as bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, FilterValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<FilterValue>) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, column: &str, value: impl Into<FilterValue>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    pub fn is_null(self, column: &str) -> Self {
        self.eq(column, FilterValue::Null)
    }

    pub fn validate(&self, columns: &[&str]) -> Res<()> {
        match self
            .conditions
            .iter()
            .find(|(column, _)| !columns.contains(&column.as_str()))
        {
            Some((column, _)) => Err(AppError::BadRequest(format!(
                "Unknown filter column '{}'",
                column
            ))),
            None => Ok(()),
        }
    }

    /// Appends the `WHERE` clause. Call `validate` first.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, (column, value)) in self.conditions.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            qb.push(column);
            match value {
                FilterValue::Null => {
                    qb.push(" IS NULL");
                }
                FilterValue::Int(v) => {
                    qb.push(" = ").push_bind(*v);
                }
                FilterValue::BigInt(v) => {
                    qb.push(" = ").push_bind(*v);
                }
                FilterValue::Text(v) => {
                    qb.push(" = ").push_bind(v.clone());
                }
                FilterValue::Uuid(v) => {
                    qb.push(" = ").push_bind(*v);
                }
                FilterValue::Bool(v) => {
                    qb.push(" = ").push_bind(*v);
                }
            }
        }
    }
}
