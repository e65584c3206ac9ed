use actix_web::web::{self};

mod routes {
    pub mod cart;
}

pub mod services {
    pub mod checkout;
    pub mod gateway;
}

pub mod dtos {
    pub mod checkout;
}

pub use services::gateway::{PaymentGateway, StripeGateway};

/// Cart endpoints. Mount behind `RequireRole::authenticated`.
pub fn mount_cart() -> actix_web::Scope {
    web::scope("/customer/cart")
        .service(routes::cart::post_checkout)
        .service(routes::cart::get_order_confirmation)
}
