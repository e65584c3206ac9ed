use std::sync::Arc;

use actix_web::web;
use api_auth::services::{store::PgUserStore, token::TokenProvider};
use api_orders::StripeGateway;
use common::{email::EmailSender, env_config::Config};
use sqlx::PgPool;

/// Every long-lived collaborator the handlers depend on, built once at start
/// and handed to each worker's `App`.
#[derive(Clone)]
pub struct AppServices {
    pub config: Arc<Config>,
    pub pool: Arc<PgPool>,
    pub users: PgUserStore,
    pub tokens: TokenProvider,
    pub mailer: EmailSender,
    pub gateway: StripeGateway,
}

impl AppServices {
    pub fn new(config: Arc<Config>, pool: Arc<PgPool>, gateway: StripeGateway) -> Self {
        AppServices {
            users: PgUserStore::new(pool.clone()),
            tokens: TokenProvider::new(&config.identity.token),
            mailer: EmailSender::new(&config.email),
            gateway,
            config,
            pool,
        }
    }

    /// Registers each service as app data. The per-request `UnitOfWork`
    /// is extracted from the pool registered here.
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::new(self.pool.clone()))
            .app_data(web::Data::new(self.users.clone()))
            .app_data(web::Data::new(self.tokens.clone()))
            .app_data(web::Data::new(self.mailer.clone()))
            .app_data(web::Data::new(self.gateway.clone()));
    }
}
