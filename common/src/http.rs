use actix_web::{HttpResponse, Responder, http::header::LOCATION};
use serde::Serialize;

use crate::error::Res;

pub struct Success;
impl Success {
    pub fn created<T: Serialize>(body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Created().json(body))
    }
    pub fn ok<T: Serialize>(body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Ok().json(body))
    }
}

/// 302 response pointing at `location`.
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((LOCATION, location))
        .finish()
}

/// Appends `ReturnUrl=<path>` to a login path.
pub fn with_return_url(path: &str, return_url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(return_url.as_bytes()).collect();
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}ReturnUrl={}", path, separator, encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_url_is_percent_encoded() {
        assert_eq!(
            with_return_url("/identity/account/login", "/admin/company?page=2"),
            "/identity/account/login?ReturnUrl=%2Fadmin%2Fcompany%3Fpage%3D2"
        );
        assert_eq!(
            with_return_url("/login?x=1", "/"),
            "/login?x=1&ReturnUrl=%2F"
        );
    }

    #[test]
    fn redirect_sets_location() {
        let res = redirect("/identity/account/access-denied");
        assert_eq!(res.status(), actix_web::http::StatusCode::FOUND);
        assert_eq!(
            res.headers().get(LOCATION).unwrap(),
            "/identity/account/access-denied"
        );
    }
}
