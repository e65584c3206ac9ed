use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::Product;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct ShoppingCart {
    pub id: i32,
    pub product_id: i32,
    pub count: i32,
    pub application_user_id: Uuid,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub product: Option<Product>,
}

impl ShoppingCart {
    /// Tiered unit price. Needs the product loaded.
    pub fn unit_price(&self) -> Option<f64> {
        self.product
            .as_ref()
            .map(|product| product.price_for_quantity(self.count))
    }
}
