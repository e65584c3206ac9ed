use actix_web::{
    HttpResponse,
    dev::ServiceResponse,
    http::header::ContentType,
    middleware::{ErrorHandlerResponse, ErrorHandlers},
};

const ERROR_PAGE: &str = "<!DOCTYPE html>\
<html><head><title>Error</title></head>\
<body><h1>Error.</h1><p>An error occurred while processing your request.</p></body></html>";

/// Replaces the body of every 5xx response with a generic page.
pub fn middleware<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new().default_handler_server(generic_error_page)
}

fn generic_error_page<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let (req, res) = res.into_parts();
    log::debug!("Hiding {} response body for {}", res.status(), req.path());
    let page = HttpResponse::build(res.status())
        .content_type(ContentType::html())
        .body(ERROR_PAGE);
    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, page).map_into_right_body(),
    ))
}
