use chrono::Utc;
use common::{
    email::EmailSender,
    error::{AppError, Res},
    misc::Role,
};
use db::models::application_user::ApplicationUser;
use uuid::Uuid;

use crate::{
    dtos::account::RegisterRequest,
    services::{
        password,
        store::UserStore,
        token::{TokenProvider, TokenPurpose},
    },
};

/// Creates an unconfirmed account and emails the confirmation link.
///
/// Users registered with a company get the `Company` role, everyone else
/// `Customer`. A failed email is logged; the account stays created.
pub async fn register<S: UserStore>(
    store: &S,
    tokens: &TokenProvider,
    mailer: &EmailSender,
    public_base_url: &str,
    req: &RegisterRequest,
) -> Res<ApplicationUser> {
    let email = req.email.trim();
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AppError::BadRequest("Email is not valid".to_string()));
    }
    password::validate_password(&req.password)?;

    if store.find_by_email(email).await?.is_some() {
        return Err(AppError::Conflict(format!("Email '{}' is already taken", email)));
    }

    let mut user = ApplicationUser::new(email, req.name.trim());
    user.password_hash = password::hash_password(&req.password)?;
    user.security_stamp = Uuid::new_v4().to_string();
    user.street_address = req.street_address.clone();
    user.city = req.city.clone();
    user.state = req.state.clone();
    user.postal_code = req.postal_code.clone();
    user.phone_number = req.phone_number.clone();
    user.company_id = req.company_id;

    let role = if user.company_id.is_some() {
        Role::Company
    } else {
        Role::Customer
    };
    store.create(&user, role).await?;
    log::info!("Registered user {} as {}", user.id, role);

    let token = tokens.generate(&user, TokenPurpose::EmailConfirmation, Utc::now())?;
    let link = confirmation_link(public_base_url, user.id, &token);
    if let Err(e) = mailer
        .send(
            &user.email,
            "Confirm your email",
            &format!(
                "Please confirm your account by <a href=\"{}\">clicking here</a>.",
                link
            ),
        )
        .await
    {
        log::error!("Failed to send confirmation email to {}: {}", user.id, e);
    }

    Ok(user)
}

pub async fn confirm_email<S: UserStore>(
    store: &S,
    tokens: &TokenProvider,
    user_id: Uuid,
    token: &str,
) -> Res<()> {
    let user = store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} does not exist", user_id)))?;
    if user.email_confirmed {
        return Ok(());
    }

    tokens.validate(token, &user, TokenPurpose::EmailConfirmation)?;
    store.confirm_email(user.id).await?;
    log::info!("User {} confirmed their email", user.id);
    Ok(())
}

/// Emails a password reset link to a confirmed account.
///
/// Unknown or unconfirmed addresses succeed without sending anything, so the
/// answer never tells which emails are registered.
pub async fn forgot_password<S: UserStore>(
    store: &S,
    tokens: &TokenProvider,
    mailer: &EmailSender,
    public_base_url: &str,
    email: &str,
) -> Res<()> {
    let user = match store.find_by_email(email.trim()).await? {
        Some(user) if user.email_confirmed => user,
        _ => {
            log::debug!("Password reset requested for an unknown or unconfirmed email");
            return Ok(());
        }
    };

    let token = tokens.generate(&user, TokenPurpose::PasswordReset, Utc::now())?;
    let link = account_link(public_base_url, "reset-password", user.id, &token);
    if let Err(e) = mailer
        .send(
            &user.email,
            "Reset your password",
            &format!(
                "Reset your password by <a href=\"{}\">clicking here</a>.",
                link
            ),
        )
        .await
    {
        log::error!("Failed to send password reset email to {}: {}", user.id, e);
    }
    Ok(())
}

/// Sets a new password from a reset token. The security stamp rotates, which
/// revokes this token and every other one issued before.
pub async fn reset_password<S: UserStore>(
    store: &S,
    tokens: &TokenProvider,
    user_id: Uuid,
    token: &str,
    new_password: &str,
) -> Res<()> {
    let invalid = || AppError::BadRequest("Invalid password reset token".to_string());
    let user = store.find_by_id(user_id).await?.ok_or_else(invalid)?;
    tokens
        .validate(token, &user, TokenPurpose::PasswordReset)
        .map_err(|_| invalid())?;
    password::validate_password(new_password)?;

    let hash = password::hash_password(new_password)?;
    store
        .set_credentials(user.id, &hash, &Uuid::new_v4().to_string())
        .await?;
    log::info!("User {} reset their password", user.id);
    Ok(())
}

pub fn confirmation_link(public_base_url: &str, user_id: Uuid, token: &str) -> String {
    account_link(public_base_url, "confirm-email", user_id, token)
}

fn account_link(public_base_url: &str, action: &str, user_id: Uuid, token: &str) -> String {
    let token: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
    format!(
        "{}/identity/account/{}?user_id={}&token={}",
        public_base_url, action, user_id, token
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::memory::MemoryUserStore;
    use common::env_config::{EmailConfig, TokenConfig};

    fn tokens() -> TokenProvider {
        TokenProvider::new(&TokenConfig {
            secret: "token-secret".to_string(),
            lifetime_hours: 1,
        })
    }

    fn mailer() -> EmailSender {
        EmailSender::new(&EmailConfig {
            api_url: None,
            api_key: String::new(),
            from: "shop@example.com".to_string(),
        })
    }

    fn request(email: &str, company_id: Option<i32>) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "Secret#1".to_string(),
            name: "Ann".to_string(),
            street_address: None,
            city: None,
            state: None,
            postal_code: None,
            phone_number: None,
            company_id,
        }
    }

    #[tokio::test]
    async fn registration_then_confirmation() {
        let store = MemoryUserStore::default();
        let tokens = tokens();
        let user = register(&store, &tokens, &mailer(), "http://shop", &request("ann@example.com", None))
            .await
            .unwrap();
        assert!(!user.email_confirmed);
        assert_eq!(store.roles(user.id).await.unwrap(), vec![Role::Customer]);

        let token = tokens.generate(&user, TokenPurpose::EmailConfirmation, Utc::now()).unwrap();
        assert!(confirm_email(&store, &tokens, user.id, "forged").await.is_err());
        confirm_email(&store, &tokens, user.id, &token).await.unwrap();
        assert!(store.find_by_id(user.id).await.unwrap().unwrap().email_confirmed);
    }

    #[tokio::test]
    async fn company_users_get_the_company_role() {
        let store = MemoryUserStore::default();
        let user = register(&store, &tokens(), &mailer(), "http://shop", &request("acme@example.com", Some(1)))
            .await
            .unwrap();
        assert_eq!(store.roles(user.id).await.unwrap(), vec![Role::Company]);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryUserStore::default();
        let tokens = tokens();
        register(&store, &tokens, &mailer(), "http://shop", &request("ann@example.com", None))
            .await
            .unwrap();
        let err = register(&store, &tokens, &mailer(), "http://shop", &request("ANN@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn password_reset_rotates_the_stamp() {
        let store = MemoryUserStore::default();
        let tokens = tokens();
        let user = register(&store, &tokens, &mailer(), "http://shop", &request("ann@example.com", None))
            .await
            .unwrap();
        store.confirm_email(user.id).await.unwrap();
        forgot_password(&store, &tokens, &mailer(), "http://shop", "ann@example.com")
            .await
            .unwrap();

        let token = tokens.generate(&user, TokenPurpose::PasswordReset, Utc::now()).unwrap();
        let weak = reset_password(&store, &tokens, user.id, &token, "short").await;
        assert!(matches!(weak, Err(AppError::BadRequest(_))));

        reset_password(&store, &tokens, user.id, &token, "Fresh#2024").await.unwrap();
        let updated = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(password::verify_password("Fresh#2024", &updated.password_hash));
        assert_ne!(updated.security_stamp, user.security_stamp);

        let reused = reset_password(&store, &tokens, user.id, &token, "Other#2024").await;
        assert!(reused.is_err());
    }

    #[tokio::test]
    async fn confirmation_token_cannot_reset_a_password() {
        let store = MemoryUserStore::default();
        let tokens = tokens();
        let user = register(&store, &tokens, &mailer(), "http://shop", &request("ann@example.com", None))
            .await
            .unwrap();
        let token = tokens.generate(&user, TokenPurpose::EmailConfirmation, Utc::now()).unwrap();
        let err = reset_password(&store, &tokens, user.id, &token, "Fresh#2024")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Invalid password reset token");
    }

    #[tokio::test]
    async fn unknown_email_reset_request_succeeds_quietly() {
        let store = MemoryUserStore::default();
        forgot_password(&store, &tokens(), &mailer(), "http://shop", "ghost@example.com")
            .await
            .unwrap();
    }

    #[test]
    fn confirmation_link_points_at_the_account_area() {
        let link = confirmation_link("https://shop.example", Uuid::nil(), "a.b_c");
        assert_eq!(
            link,
            "https://shop.example/identity/account/confirm-email?user_id=00000000-0000-0000-0000-000000000000&token=a.b_c"
        );
    }
}
