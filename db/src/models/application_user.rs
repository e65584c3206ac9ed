use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::company::Company;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct ApplicationUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub normalized_email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub security_stamp: String,
    pub email_confirmed: bool,
    pub name: String,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub phone_number: Option<String>,
    pub company_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub company: Option<Company>,
}

impl ApplicationUser {
    /// A new, unconfirmed user. Credentials are filled in by the identity layer.
    pub fn new(email: &str, name: &str) -> Self {
        ApplicationUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            normalized_email: normalize_email(email),
            password_hash: String::new(),
            security_stamp: String::new(),
            email_confirmed: false,
            name: name.to_string(),
            street_address: None,
            city: None,
            state: None,
            postal_code: None,
            phone_number: None,
            company_id: None,
            created_at: Utc::now(),
            company: None,
        }
    }
}

/// Lookup key for emails: trimmed and upper-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_uppercase()
}
