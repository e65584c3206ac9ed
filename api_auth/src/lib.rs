use actix_session::{
    SessionMiddleware,
    config::{CookieContentSecurity, PersistentSession, TtlExtensionPolicy},
    storage::CookieSessionStore,
};
use actix_web::{
    cookie::{Key, SameSite, time},
    web,
};
use common::{
    env_config::Config,
    error::{AppError, Res},
};
use middleware::authentication::AuthenticationMiddleware;
use session::SessionPolicy;

pub mod middleware {
    pub mod authentication;
    pub mod authorization;
}
pub mod dtos {
    pub mod account;
}
pub mod services {
    pub mod account;
    pub mod auth;
    pub mod password;
    pub mod roles;
    pub mod store;
    pub mod token;
}
mod routes {
    pub mod account;
}
pub mod principal;
pub mod session;

pub use middleware::authorization::RequireRole;
pub use principal::Principal;

pub const SESSION_COOKIE: &str = "storefront.session";

/// Signing key for the session cookie, from `SESSION_SECRET`.
pub fn session_key(config: &Config) -> Res<Key> {
    Key::try_from(config.cookie.secret.as_bytes())
        .map_err(|e| AppError::Config(format!("Invalid SESSION_SECRET. {}", e)))
}

/// Signed session cookie whose lifetime slides with every request.
pub fn session_middleware(config: &Config, key: Key) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name(SESSION_COOKIE.to_string())
        .cookie_http_only(true)
        .cookie_secure(!config.is_development())
        .cookie_same_site(SameSite::Lax)
        .cookie_content_security(CookieContentSecurity::Signed)
        .session_lifecycle(
            PersistentSession::default()
                .session_ttl(time::Duration::minutes(config.cookie.expire_minutes))
                .session_ttl_extension_policy(TtlExtensionPolicy::OnEveryRequest),
        )
        .build()
}

pub fn authentication_middleware(config: &Config) -> AuthenticationMiddleware {
    AuthenticationMiddleware::new(SessionPolicy::from_config(&config.cookie))
}

/// Sign-out endpoint at `LOGOUT_PATH`. Register it ahead of
/// [`mount_account`], whose scope would otherwise claim the default path.
pub fn mount_logout(config: &Config) -> actix_web::Resource {
    web::resource(config.cookie.logout_path.clone())
        .route(web::post().to(routes::account::post_logout))
}

pub fn mount_account() -> actix_web::Scope {
    web::scope("/identity/account")
        .service(routes::account::post_register)
        .service(routes::account::get_confirm_email)
        .service(routes::account::post_login)
        .service(routes::account::post_forgot_password)
        .service(routes::account::post_reset_password)
        .service(routes::account::get_access_denied)
        .service(routes::account::get_me)
}
