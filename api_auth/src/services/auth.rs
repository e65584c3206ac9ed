use chrono::{DateTime, Utc};
use common::{
    error::{AppError, Res},
    misc::Role,
};
use db::models::application_user::ApplicationUser;

use crate::{
    dtos::account::LoginRequest,
    services::{
        password,
        store::UserStore,
        token::{TokenProvider, TokenPurpose},
    },
    session::{SessionPolicy, SessionState},
};

#[derive(Debug, Clone, Copy)]
pub struct SignInOptions {
    pub require_confirmed_account: bool,
}

/// Verifies credentials and loads the roles of the user.
///
/// Every credential problem (unknown email, wrong password, bad security
/// token, unconfirmed account) yields the same `authentication_failed`
/// error. Store failures pass through unchanged.
pub async fn check_credentials<S: UserStore>(
    store: &S,
    tokens: &TokenProvider,
    request: &LoginRequest,
    options: SignInOptions,
) -> Res<(ApplicationUser, Vec<Role>)> {
    let user = match store.find_by_email(&request.email).await? {
        Some(user) => user,
        None => {
            log::debug!("Sign-in for unknown email {}", request.email);
            password::verify_unowned(&request.password);
            return Err(AppError::authentication_failed());
        }
    };

    if !password::verify_password(&request.password, &user.password_hash) {
        log::debug!("Wrong password for {}", user.id);
        return Err(AppError::authentication_failed());
    }

    if let Some(token) = &request.security_token {
        if tokens.validate(token, &user, TokenPurpose::SignIn).is_err() {
            log::debug!("Invalid sign-in token for {}", user.id);
            return Err(AppError::authentication_failed());
        }
    }

    if options.require_confirmed_account && !user.email_confirmed {
        log::debug!("Unconfirmed account {} tried to sign in", user.id);
        return Err(AppError::authentication_failed());
    }

    let roles = store.roles(user.id).await?;
    Ok((user, roles))
}

/// Runs the sign-in transition for a request: `Anonymous -> Authenticating`
/// and then `Authenticated` or back to `Anonymous`.
pub async fn sign_in<S: UserStore>(
    store: &S,
    tokens: &TokenProvider,
    request: &LoginRequest,
    options: SignInOptions,
    policy: &SessionPolicy,
    now: DateTime<Utc>,
) -> (SessionState, Res<()>) {
    let state = SessionState::Anonymous.begin_sign_in(&request.email);
    let checked = check_credentials(store, tokens, request, options).await;
    let state = state.complete_sign_in(&checked, policy, now);
    (state, checked.map(|_| ()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::memory::MemoryUserStore;
    use common::{env_config::TokenConfig, error::AUTHENTICATION_FAILED};

    const PASSWORD: &str = "Secret#1";

    fn tokens() -> TokenProvider {
        TokenProvider::new(&TokenConfig {
            secret: "token-secret".to_string(),
            lifetime_hours: 1,
        })
    }

    fn store(confirmed: bool) -> (MemoryUserStore, ApplicationUser) {
        let mut user = ApplicationUser::new("ann@example.com", "Ann");
        user.password_hash = password::hash_password(PASSWORD).unwrap();
        user.security_stamp = "stamp".to_string();
        user.email_confirmed = confirmed;
        (MemoryUserStore::with(user.clone(), vec![Role::Customer]), user)
    }

    fn login(password: &str) -> LoginRequest {
        LoginRequest {
            email: "ann@example.com".to_string(),
            password: password.to_string(),
            security_token: None,
        }
    }

    const REQUIRE_CONFIRMED: SignInOptions = SignInOptions {
        require_confirmed_account: true,
    };

    #[tokio::test]
    async fn correct_password_on_confirmed_account_authenticates() {
        let (store, user) = store(true);
        let (state, result) = sign_in(
            &store,
            &tokens(),
            &login(PASSWORD),
            REQUIRE_CONFIRMED,
            &SessionPolicy::default(),
            Utc::now(),
        )
        .await;

        assert!(result.is_ok());
        let principal = state.principal().unwrap();
        assert_eq!(principal.user_id, user.id);
        assert!(principal.is_in_role(Role::Customer));
    }

    #[tokio::test]
    async fn unconfirmed_account_stays_anonymous_with_correct_password() {
        let (store, _) = store(false);
        let (state, result) = sign_in(
            &store,
            &tokens(),
            &login(PASSWORD),
            REQUIRE_CONFIRMED,
            &SessionPolicy::default(),
            Utc::now(),
        )
        .await;

        assert_eq!(state, SessionState::Anonymous);
        assert_eq!(result.unwrap_err().to_string(), format!("Authorization error: {}", AUTHENTICATION_FAILED));
    }

    #[tokio::test]
    async fn all_credential_failures_look_the_same() {
        let (store, user) = store(true);
        let tokens = tokens();

        let wrong_password = check_credentials(&store, &tokens, &login("Wrong#99"), REQUIRE_CONFIRMED)
            .await
            .unwrap_err()
            .to_string();

        let mut unknown = login(PASSWORD);
        unknown.email = "nobody@example.com".to_string();
        let unknown_email = check_credentials(&store, &tokens, &unknown, REQUIRE_CONFIRMED)
            .await
            .unwrap_err()
            .to_string();

        let mut bad_token = login(PASSWORD);
        let reset = tokens.generate(&user, TokenPurpose::PasswordReset, Utc::now()).unwrap();
        bad_token.security_token = Some(reset);
        let token_mismatch = check_credentials(&store, &tokens, &bad_token, REQUIRE_CONFIRMED)
            .await
            .unwrap_err()
            .to_string();

        assert_eq!(wrong_password, unknown_email);
        assert_eq!(unknown_email, token_mismatch);
    }

    #[tokio::test]
    async fn unknown_email_still_pays_for_a_hash_check() {
        let (store, _) = store(true);
        let tokens = tokens();
        let mut unknown = login(PASSWORD);
        unknown.email = "nobody@example.com".to_string();

        let started = std::time::Instant::now();
        check_credentials(&store, &tokens, &login("Wrong#99"), REQUIRE_CONFIRMED)
            .await
            .unwrap_err();
        let wrong_password = started.elapsed();

        let started = std::time::Instant::now();
        check_credentials(&store, &tokens, &unknown, REQUIRE_CONFIRMED)
            .await
            .unwrap_err();
        let unknown_email = started.elapsed();

        assert!(
            unknown_email * 4 >= wrong_password,
            "unknown {:?} vs wrong password {:?}",
            unknown_email,
            wrong_password
        );
    }

    #[tokio::test]
    async fn confirmation_can_be_switched_off() {
        let (store, _) = store(false);
        let checked = check_credentials(
            &store,
            &tokens(),
            &login(PASSWORD),
            SignInOptions {
                require_confirmed_account: false,
            },
        )
        .await;
        assert!(checked.is_ok());
    }
}
