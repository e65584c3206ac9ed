use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::application_user::ApplicationUser;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct OrderHeader {
    pub id: i32,
    pub application_user_id: Uuid,
    pub order_date: DateTime<Utc>,
    pub shipping_date: Option<DateTime<Utc>>,
    pub order_total: f64,
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_due_date: Option<DateTime<Utc>>,
    pub session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub phone_number: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub name: String,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub application_user: Option<ApplicationUser>,
}
