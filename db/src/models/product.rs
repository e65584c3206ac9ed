use serde::{Deserialize, Serialize};

use super::category::Category;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub isbn: String,
    pub author: String,
    pub list_price: f64,
    /// Unit price for 1-50 copies.
    pub price: f64,
    /// Unit price for 51-100 copies.
    pub price50: f64,
    /// Unit price above 100 copies.
    pub price100: f64,
    pub category_id: i32,
    pub image_url: Option<String>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<Category>,
}

impl Product {
    pub fn price_for_quantity(&self, count: i32) -> f64 {
        match count {
            ..=50 => self.price,
            51..=100 => self.price50,
            _ => self.price100,
        }
    }
}
