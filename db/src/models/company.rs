use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, sqlx::FromRow, Serialize, Deserialize)]
pub struct Company {
    pub id: i32,
    pub name: String,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub phone_number: Option<String>,
}

impl Company {
    pub fn named(id: i32, name: &str) -> Self {
        Company {
            id,
            name: name.to_string(),
            ..Default::default()
        }
    }
}
