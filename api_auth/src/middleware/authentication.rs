use std::rc::Rc;

use actix_session::SessionExt;
use actix_web::{
    Error, HttpMessage,
    body::BoxBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use chrono::Utc;
use futures::future::{LocalBoxFuture, Ready, ok};

use crate::session::{AuthTicket, SessionPolicy, SessionState, TICKET_KEY};

/// Resolves the session cookie into a [`Principal`](crate::principal::Principal).
///
/// Live tickets are renewed according to the policy and written back to the
/// session; expired ones are removed. Requests without a live ticket pass
/// through anonymously, access checks happen in `RequireRole`.
pub struct AuthenticationMiddleware {
    policy: Rc<SessionPolicy>,
}

impl AuthenticationMiddleware {
    pub fn new(policy: SessionPolicy) -> Self {
        AuthenticationMiddleware {
            policy: Rc::new(policy),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthenticationMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthenticationMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthenticationMiddlewareService {
            service,
            policy: self.policy.clone(),
        })
    }
}

pub struct AuthenticationMiddlewareService<S> {
    service: S,
    policy: Rc<SessionPolicy>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddlewareService<S>
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
        let session = req.get_session();
        let ticket = session.get::<AuthTicket>(TICKET_KEY).unwrap_or_else(|e| {
            log::warn!("Dropping unreadable auth ticket: {}", e);
            None
        });

        match SessionState::resume(ticket, &self.policy, Utc::now()) {
            SessionState::Authenticated(ticket) => {
                if self.policy.sliding {
                    if let Err(e) = session.insert(TICKET_KEY, &ticket) {
                        log::error!("Failed to renew auth ticket: {}", e);
                    }
                }
                req.extensions_mut()
                    .insert(crate::principal::Principal::from(&ticket));
            }
            SessionState::Expired => {
                log::debug!("Session expired for {}", req.path());
                session.remove(TICKET_KEY);
            }
            _ => {}
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(|res| res.map_into_boxed_body()) })
    }
}
