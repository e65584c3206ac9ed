use std::{collections::BTreeMap, rc::Rc, sync::Arc, time::Instant};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use api_auth::Principal;
use colored::{ColoredString, Colorize};
use common::env_config::Config;
use futures::future::{LocalBoxFuture, Ready, ready};
use log::info;
use serde_json::{Value, json};

#[derive(Default)]
pub struct LoggerMiddleware {}

impl LoggerMiddleware {
    pub fn new() -> Self {
        Self {}
    }
}

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = LoggerMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let console_logging_enabled = req
            .app_data::<web::Data<Arc<Config>>>()
            .is_none_or(|config| config.console_logging_enabled);
        let method = req.method().to_string();
        let path = req.path().to_string();
        let params = query_params(req.query_string());
        let started = Instant::now();
        let srv = Rc::clone(&self.service);

        Box::pin(async move {
            let res = srv.call(req).await?;
            if !console_logging_enabled {
                return Ok(res);
            }

            // the authentication middleware runs inside this one
            let principal = res
                .request()
                .extensions()
                .get::<Principal>()
                .map(|p| p.email.clone());
            let status_code = res.status().as_u16();

            info!(
                "[{}] {} {} {} user={} params={}",
                status_color(status_code),
                method_color(&method),
                path.bright_white(),
                format!("({}ms)", started.elapsed().as_millis()).bright_black(),
                principal.as_deref().unwrap_or("anonymous").bright_blue(),
                params.to_string().bright_cyan(),
            );
            Ok(res)
        })
    }
}

/// Query string as a JSON object. Flag parameters without a value map to `true`.
fn query_params(query_string: &str) -> Value {
    let params: BTreeMap<String, Value> = query_string
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), json!(value)),
            None => (pair.to_string(), json!(true)),
        })
        .collect();
    json!(params)
}

fn status_color(status_code: u16) -> ColoredString {
    match status_code {
        200..=299 => status_code.to_string().green(),
        300..=399 => status_code.to_string().yellow(),
        400..=499 => status_code.to_string().bright_red(),
        _ => status_code.to_string().red(),
    }
}

fn method_color(method: &str) -> ColoredString {
    match method {
        "GET" => method.blue(),
        "POST" => method.yellow(),
        "PUT" => method.purple(),
        "DELETE" => method.red(),
        _ => method.normal(),
    }
}
