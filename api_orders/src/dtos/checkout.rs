use serde::{Deserialize, Serialize};

/// Shipping details for a new order. Missing fields fall back to the
/// signed-in user's profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: i32,
    pub order_total: f64,
    /// Stripe Checkout page for customers. `None` for company accounts,
    /// which pay later.
    pub payment_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderConfirmationResponse {
    pub order_id: i32,
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
}
