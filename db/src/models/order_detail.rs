use serde::{Deserialize, Serialize};

use super::product::Product;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: i32,
    pub order_header_id: i32,
    pub product_id: i32,
    pub count: i32,
    pub price: f64,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub product: Option<Product>,
}
