use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use api_auth::Principal;
use chrono::Utc;
use common::{env_config::Config, error::Res, http::Success};
use db::UnitOfWork;

use crate::{
    dtos::checkout::{CheckoutRequest, OrderConfirmationResponse},
    services::{checkout, gateway::StripeGateway},
};

/// Places an order for everything in the signed-in user's cart.
///
/// # Input
/// - `principal`: the signed-in user
/// - `req`: optional shipping details; missing fields come from the profile
///
/// # Output
/// - Success: 201 with the order id, the total and, for customers, the
///   Stripe Checkout url to send the buyer to. Company accounts get no url
///   and pay within 30 days.
/// - Error: 400 when the cart is empty or shipping details are incomplete
#[post("/checkout")]
pub async fn post_checkout(
    principal: Principal,
    req: Option<web::Json<CheckoutRequest>>,
    mut uow: UnitOfWork,
    gateway: web::Data<StripeGateway>,
    config: web::Data<Arc<Config>>,
) -> Res<impl Responder> {
    let req = req.map(web::Json::into_inner).unwrap_or_default();
    let response = checkout::place_order(
        &mut uow,
        gateway.get_ref(),
        principal.user_id,
        &req,
        &config.public_base_url,
        Utc::now(),
    )
    .await?;
    Success::created(response)
}

/// Landing page after Stripe Checkout. Approves paid orders and empties the cart.
#[get("/order-confirmation/{id}")]
pub async fn get_order_confirmation(
    principal: Principal,
    path: web::Path<i32>,
    mut uow: UnitOfWork,
    gateway: web::Data<StripeGateway>,
) -> Res<impl Responder> {
    let order = checkout::confirm_order(
        &mut uow,
        gateway.get_ref(),
        path.into_inner(),
        &principal,
    )
    .await?;
    Success::ok(OrderConfirmationResponse {
        order_id: order.id,
        order_status: order.order_status,
        payment_status: order.payment_status,
    })
}
