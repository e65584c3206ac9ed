use std::sync::Arc;

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use common::error::AppError;
use futures::future::{Ready, ready};
use sqlx::PgPool;

use super::UnitOfWork;

/// Every handler that names a `UnitOfWork` gets a fresh one over the shared
/// pool. It is dropped with the request, discarding anything not saved.
impl FromRequest for UnitOfWork {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.app_data::<web::Data<Arc<PgPool>>>()
                .map(|pool| UnitOfWork::new(pool.get_ref().clone()))
                .ok_or_else(|| AppError::Internal("Database pool is not registered".to_string())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use sqlx::postgres::PgPoolOptions;

    #[actix_web::test]
    async fn each_request_gets_an_empty_unit_of_work() {
        let pool = Arc::new(
            PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .unwrap(),
        );
        let req = TestRequest::default()
            .app_data(web::Data::new(pool))
            .to_http_request();

        let uow = UnitOfWork::extract(&req).await.unwrap();
        assert!(!uow.has_changes());
    }

    #[actix_web::test]
    async fn missing_pool_is_an_internal_error() {
        let req = TestRequest::default().to_http_request();
        let err = UnitOfWork::extract(&req).await.err().unwrap();
        assert!(err.is_internal());
    }
}
