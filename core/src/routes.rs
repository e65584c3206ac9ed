use actix_web::{
    Error, Scope,
    body::BoxBody,
    cookie::Key,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    web,
};
use api_auth::RequireRole;
use common::env_config::Config;

/// Every route that runs behind the session cookie.
///
/// Static files are registered next to this scope rather than inside it, so
/// serving them never loads, renews or re-issues the session.
pub fn storefront(
    config: &Config,
    session_key: Key,
) -> Scope<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<BoxBody>,
        Error = Error,
        InitError = (),
    > + use<>,
> {
    web::scope("")
        .service(api_auth::mount_logout(config))
        .service(api_auth::mount_account())
        .service(api_orders::mount_cart().wrap(RequireRole::authenticated(&config.cookie)))
        .wrap(api_auth::authentication_middleware(config))
        .wrap(api_auth::session_middleware(config, session_key))
}
