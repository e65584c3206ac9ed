use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use common::{
    error::{AppError, Res},
    misc::Role,
};
use futures::future::{Ready, ready};
use serde::Serialize;
use uuid::Uuid;

use crate::session::AuthTicket;

/// The signed-in user of the current request.
///
/// Inserted into request extensions by the authentication middleware.
/// Extracting it in a handler fails with 401 for anonymous requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub company_id: Option<i32>,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn is_in_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_in_any_role(&self, roles: &[Role]) -> bool {
        roles.is_empty() || roles.iter().any(|role| self.is_in_role(*role))
    }
}

impl From<&AuthTicket> for Principal {
    fn from(ticket: &AuthTicket) -> Self {
        Principal {
            user_id: ticket.user_id,
            email: ticket.email.clone(),
            name: ticket.name.clone(),
            company_id: ticket.company_id,
            roles: ticket.roles.clone(),
        }
    }
}

impl FromRequest for Principal {
    type Error = AppError;
    type Future = Ready<Res<Self>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Principal>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string())),
        )
    }
}
