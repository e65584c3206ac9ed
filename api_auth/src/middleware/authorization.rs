use std::rc::Rc;

use actix_web::{
    Error, HttpMessage,
    body::BoxBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::{
    env_config::CookieConfig,
    http::{redirect, with_return_url},
    misc::Role,
};
use futures::future::{LocalBoxFuture, Ready, ok};

use crate::principal::Principal;

struct Rule {
    roles: Vec<Role>,
    login_path: String,
    access_denied_path: String,
}

/// Guards a scope. Anonymous requests are sent to the login path with a
/// `ReturnUrl`; signed-in users lacking every listed role are sent to the
/// access-denied path. An empty role list admits any signed-in user.
///
/// Must be wrapped inside the authentication middleware.
pub struct RequireRole {
    rule: Rc<Rule>,
}

impl RequireRole {
    pub fn any(roles: &[Role], cookie: &CookieConfig) -> Self {
        RequireRole {
            rule: Rc::new(Rule {
                roles: roles.to_vec(),
                login_path: cookie.login_path.clone(),
                access_denied_path: cookie.access_denied_path.clone(),
            }),
        }
    }

    pub fn authenticated(cookie: &CookieConfig) -> Self {
        Self::any(&[], cookie)
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RequireRoleService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequireRoleService {
            service,
            rule: self.rule.clone(),
        })
    }
}

pub struct RequireRoleService<S> {
    service: S,
    rule: Rc<Rule>,
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let principal = req.extensions().get::<Principal>().cloned();

        let location = match principal {
            None => {
                let target = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| req.path().to_string());
                Some(with_return_url(&self.rule.login_path, &target))
            }
            Some(p) if !p.is_in_any_role(&self.rule.roles) => {
                log::info!("{} denied access to {}", p.user_id, req.path());
                Some(self.rule.access_denied_path.clone())
            }
            Some(_) => None,
        };

        if let Some(location) = location {
            let response = redirect(&location);
            return Box::pin(async move { Ok(req.into_response(response)) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(|res| res.map_into_boxed_body()) })
    }
}
