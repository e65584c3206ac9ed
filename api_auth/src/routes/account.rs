use std::sync::Arc;

use actix_session::Session;
use actix_web::{HttpResponse, Responder, get, post, web};
use chrono::Utc;
use common::{
    email::EmailSender,
    env_config::Config,
    error::{AppError, Res},
    http::{Success, redirect},
};
use serde_json::json;

use crate::{
    dtos::account::{
        ConfirmEmailQuery, ForgotPasswordRequest, LoginRequest, RegisterRequest,
        RegisterResponse, ResetPasswordRequest, ReturnUrlQuery, SignInResponse,
    },
    principal::Principal,
    services::{
        self,
        auth::SignInOptions,
        store::{PgUserStore, UserStore},
        token::TokenProvider,
    },
    session::{AuthTicket, SessionPolicy, TICKET_KEY},
};

/// Registers a new account.
///
/// The account starts unconfirmed and a confirmation link is emailed. When
/// confirmation is not required the new user is signed in right away.
#[post("/register")]
pub async fn post_register(
    req: web::Json<RegisterRequest>,
    store: web::Data<PgUserStore>,
    tokens: web::Data<TokenProvider>,
    mailer: web::Data<EmailSender>,
    config: web::Data<Arc<Config>>,
    session: Session,
) -> Res<impl Responder> {
    let user = services::account::register(
        store.get_ref(),
        &tokens,
        &mailer,
        &config.public_base_url,
        &req,
    )
    .await?;

    let requires_confirmation = config.identity.require_confirmed_account;
    if !requires_confirmation {
        let roles = store.roles(user.id).await?;
        let ticket = SessionPolicy::from_config(&config.cookie).issue(&user, roles, Utc::now());
        store_ticket(&session, &ticket)?;
    }

    Success::created(RegisterResponse {
        user_id: user.id,
        email: user.email,
        requires_confirmation,
    })
}

#[get("/confirm-email")]
pub async fn get_confirm_email(
    query: web::Query<ConfirmEmailQuery>,
    store: web::Data<PgUserStore>,
    tokens: web::Data<TokenProvider>,
) -> Res<impl Responder> {
    services::account::confirm_email(store.get_ref(), &tokens, query.user_id, &query.token)
        .await?;
    Success::ok(json!({ "confirmed": true }))
}

/// Signs in with email and password.
///
/// Redirects to a local `ReturnUrl` when one is given, otherwise answers with
/// the principal. Every rejected sign-in gets the same 401 body.
#[post("/login")]
pub async fn post_login(
    body: web::Json<LoginRequest>,
    query: web::Query<ReturnUrlQuery>,
    store: web::Data<PgUserStore>,
    tokens: web::Data<TokenProvider>,
    config: web::Data<Arc<Config>>,
    session: Session,
) -> Res<HttpResponse> {
    let options = SignInOptions {
        require_confirmed_account: config.identity.require_confirmed_account,
    };
    let policy = SessionPolicy::from_config(&config.cookie);

    let (state, result) =
        services::auth::sign_in(store.get_ref(), &tokens, &body, options, &policy, Utc::now())
            .await;
    result?;
    let ticket = state.ticket().ok_or_else(AppError::authentication_failed)?;

    session.renew();
    store_ticket(&session, ticket)?;
    log::info!("User {} signed in", ticket.user_id);

    match local_return_url(query.return_url.as_deref()) {
        Some(url) => Ok(redirect(url)),
        None => Ok(HttpResponse::Ok().json(SignInResponse {
            principal: Principal::from(ticket),
            expires_at: ticket.expires_at,
        })),
    }
}

/// Starts a password reset. Always answers the same way.
#[post("/forgot-password")]
pub async fn post_forgot_password(
    req: web::Json<ForgotPasswordRequest>,
    store: web::Data<PgUserStore>,
    tokens: web::Data<TokenProvider>,
    mailer: web::Data<EmailSender>,
    config: web::Data<Arc<Config>>,
) -> Res<impl Responder> {
    services::account::forgot_password(
        store.get_ref(),
        &tokens,
        &mailer,
        &config.public_base_url,
        &req.email,
    )
    .await?;
    Success::ok(json!({ "sent": true }))
}

#[post("/reset-password")]
pub async fn post_reset_password(
    req: web::Json<ResetPasswordRequest>,
    store: web::Data<PgUserStore>,
    tokens: web::Data<TokenProvider>,
) -> Res<impl Responder> {
    services::account::reset_password(
        store.get_ref(),
        &tokens,
        req.user_id,
        &req.token,
        &req.password,
    )
    .await?;
    Success::ok(json!({ "reset": true }))
}

/// Signs out. Mounted at the configured logout path.
pub async fn post_logout(
    query: web::Query<ReturnUrlQuery>,
    principal: Option<Principal>,
    session: Session,
) -> HttpResponse {
    if let Some(principal) = principal {
        log::info!("User {} signed out", principal.user_id);
    }
    session.purge();

    match local_return_url(query.return_url.as_deref()) {
        Some(url) => redirect(url),
        None => HttpResponse::Ok().json(json!({ "signed_out": true })),
    }
}

#[get("/access-denied")]
pub async fn get_access_denied() -> HttpResponse {
    HttpResponse::Forbidden().json(json!({ "error": "You do not have access to this resource" }))
}

#[get("/me")]
pub async fn get_me(principal: Principal, store: web::Data<PgUserStore>) -> Res<impl Responder> {
    let user = store
        .find_by_id(principal.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User no longer exists".to_string()))?;
    Success::ok(user)
}

fn store_ticket(session: &Session, ticket: &AuthTicket) -> Res<()> {
    session
        .insert(TICKET_KEY, ticket)
        .map_err(|e| AppError::Internal(format!("Failed to store auth ticket. {}", e)))
}

/// Only same-site paths are followed after sign-in and sign-out.
fn local_return_url(url: Option<&str>) -> Option<&str> {
    url.filter(|u| u.starts_with('/') && !u.starts_with("//") && !u.starts_with("/\\"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_return_urls_are_followed() {
        assert_eq!(local_return_url(Some("/customer/cart")), Some("/customer/cart"));
        assert_eq!(local_return_url(Some("//evil.example")), None);
        assert_eq!(local_return_url(Some("/\\evil.example")), None);
        assert_eq!(local_return_url(Some("https://evil.example")), None);
        assert_eq!(local_return_url(None), None);
    }
}
