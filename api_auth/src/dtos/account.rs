use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::principal::Principal;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub phone_number: Option<String>,
    pub company_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Optional second factor, a `SignIn` security token.
    #[serde(default)]
    pub security_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReturnUrlQuery {
    #[serde(rename = "ReturnUrl", alias = "return_url")]
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmEmailQuery {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub user_id: Uuid,
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub principal: Principal,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
    pub requires_confirmation: bool,
}
