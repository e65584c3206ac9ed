mod errors;
mod https;
mod pipeline;
mod routes;
mod services;

use std::{fmt::Display, io};

use actix_files::Files;
use actix_web::{App, HttpServer, middleware::Condition};
use api_orders::StripeGateway;
use common::env_config::Config;
use pipeline::{Pipeline, Stage};
use services::AppServices;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // get env vars
    let config = Config::from_env().map_err(startup("Failed to load configuration"))?;

    // init logger
    logger::setup(&config.log_file, config.console_logging_enabled)
        .map_err(startup("Failed to set up logger"))?;
    common::error::set_detailed_errors(config.is_development());

    let pipeline = Pipeline::for_environment(config.environment);
    pipeline
        .validate()
        .map_err(startup("Invalid request pipeline"))?;
    log::info!("Request pipeline: {}", pipeline);

    // init db connection and bring the schema up to date
    let pool = db::setup(&config.database_url, !config.is_development())
        .await
        .map_err(startup("Failed to set up database"))?;
    api_auth::services::roles::seed_roles(&pool)
        .await
        .map_err(startup("Failed to seed roles"))?;

    let gateway = StripeGateway::from_config(&config.stripe);
    let session_key = api_auth::session_key(&config).map_err(startup("Invalid session key"))?;
    let services = AppServices::new(config.clone(), pool, gateway);

    let hardened = pipeline.is_hardened();
    let hsts = pipeline.has(Stage::Hsts);
    let https_port = pipeline
        .has(Stage::HttpsRedirection)
        .then_some(config.https_port)
        .flatten();
    if https_port.is_none() {
        log::warn!("No HTTPS port configured, plain HTTP requests will not be redirected");
    }
    log::info!(
        "Starting server on {}:{} with {} workers",
        config.server_host,
        config.server_port,
        config.num_workers
    );

    HttpServer::new(move || {
        let config = &services.config;
        // wrap order is innermost first: the last wrap sees the request first.
        // Static files match before the routed scope, which alone carries the
        // session and authentication.
        App::new()
            .configure(|cfg| services.register(cfg))
            .service(Files::new("/static", &config.static_dir))
            .service(routes::storefront(config, session_key.clone()))
            .wrap(https::HttpsRedirect::new(https_port))
            .wrap(Condition::new(hsts, https::hsts()))
            .wrap(logger::middleware())
            .wrap(Condition::new(hardened, errors::middleware()))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}

/// Logs a failed startup step and turns it into the error `main` exits with.
fn startup<E: Display>(step: &'static str) -> impl FnOnce(E) -> io::Error {
    move |err| {
        log::error!("{}: {}", step, err);
        io::Error::other(format!("{}: {}", step, err))
    }
}
