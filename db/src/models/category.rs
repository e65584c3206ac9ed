use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub display_order: i32,
}
