use actix_web::{
    Error,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header,
    middleware::DefaultHeaders,
};
use common::http::redirect;
use futures::future::{LocalBoxFuture, Ready, ok};

/// 30 days, the usual default for storefront deployments.
const HSTS: &str = "max-age=2592000";

/// `Strict-Transport-Security` on every response.
pub fn hsts() -> DefaultHeaders {
    DefaultHeaders::new().add((header::STRICT_TRANSPORT_SECURITY, HSTS))
}

/// Redirects plain HTTP requests to HTTPS on `port`.
///
/// Without a port there is nowhere to redirect to and requests pass through
/// unchanged, which is how a development server without TLS keeps working.
pub struct HttpsRedirect {
    port: Option<u16>,
}

impl HttpsRedirect {
    pub fn new(port: Option<u16>) -> Self {
        HttpsRedirect { port }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HttpsRedirect
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = HttpsRedirectService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(HttpsRedirectService {
            service,
            port: self.port,
        })
    }
}

pub struct HttpsRedirectService<S> {
    service: S,
    port: Option<u16>,
}

impl<S, B> Service<ServiceRequest> for HttpsRedirectService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let target = self.port.and_then(|port| {
            let info = req.connection_info();
            (info.scheme() != "https").then(|| {
                let path = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                https_url(info.host(), port, path)
            })
        });

        if let Some(target) = target {
            let response = redirect(&target);
            return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { Ok(fut.await?.map_into_left_body()) })
    }
}

/// Swaps the scheme and port of `host`; 443 is left implicit.
fn https_url(host: &str, port: u16, path: &str) -> String {
    let name = match host.rsplit_once(':') {
        Some((name, p)) if !name.is_empty() && p.parse::<u16>().is_ok() => name,
        _ => host,
    };
    match port {
        443 => format!("https://{}{}", name, path),
        port => format!("https://{}:{}{}", name, port, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};

    #[actix_web::test]
    async fn plain_http_is_redirected_to_https() {
        let app = test::init_service(
            App::new()
                .wrap(HttpsRedirect::new(Some(443)))
                .route("/products", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/products?page=2")
            .insert_header((header::HOST, "shop.example:8080"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(
            res.headers().get(header::LOCATION).unwrap(),
            "https://shop.example/products?page=2"
        );

        let req = test::TestRequest::get()
            .uri("/products")
            .insert_header(("x-forwarded-proto", "https"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn without_a_port_requests_pass_through() {
        let app = test::init_service(
            App::new()
                .wrap(HttpsRedirect::new(None))
                .route("/products", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get().uri("/products").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[::core::prelude::v1::test]
    fn non_default_port_is_kept_in_the_target() {
        assert_eq!(
            https_url("localhost:8080", 8443, "/cart"),
            "https://localhost:8443/cart"
        );
        assert_eq!(https_url("[::1]", 443, "/"), "https://[::1]/");
    }

    #[actix_web::test]
    async fn hsts_is_added_to_every_response() {
        let app = test::init_service(
            App::new()
                .wrap(hsts())
                .route("/products", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get().uri("/products").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(
            res.headers().get(header::STRICT_TRANSPORT_SECURITY).unwrap(),
            HSTS
        );
    }
}
