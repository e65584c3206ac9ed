use chrono::{DateTime, Duration, Utc};
use common::{
    env_config::TokenConfig,
    error::{AppError, Res},
};
use db::models::application_user::ApplicationUser;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPurpose {
    EmailConfirmation,
    PasswordReset,
    SignIn,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: Uuid,
    purpose: TokenPurpose,
    /// Security stamp at issue time. Rotating the stamp revokes the token.
    stamp: String,
    exp: usize,
}

/// Issues and checks single-purpose security tokens (HS256 JWTs).
#[derive(Clone)]
pub struct TokenProvider {
    secret: String,
    lifetime: Duration,
}

impl TokenProvider {
    pub fn new(config: &TokenConfig) -> Self {
        TokenProvider {
            secret: config.secret.clone(),
            lifetime: Duration::hours(config.lifetime_hours),
        }
    }

    pub fn generate(
        &self,
        user: &ApplicationUser,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Res<String> {
        let claims = TokenClaims {
            sub: user.id,
            purpose,
            stamp: user.security_stamp.clone(),
            exp: (now + self.lifetime).timestamp().max(0) as usize,
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(AppError::from)
    }

    /// Checks signature, expiry, owner, purpose and security stamp.
    pub fn validate(&self, token: &str, user: &ApplicationUser, purpose: TokenPurpose) -> Res<()> {
        let claims = jsonwebtoken::decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            log::debug!("Rejected {:?} token: {}", purpose, e);
            invalid_token()
        })?
        .claims;

        if claims.sub != user.id || claims.purpose != purpose || claims.stamp != user.security_stamp {
            return Err(invalid_token());
        }
        Ok(())
    }
}

fn invalid_token() -> AppError {
    AppError::BadRequest("Invalid token".to_string())
}
