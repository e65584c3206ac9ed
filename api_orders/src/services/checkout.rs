use api_auth::Principal;
use chrono::{DateTime, Duration, Utc};
use common::{
    error::{AppError, Res},
    misc::{OrderStatus, PaymentStatus, Role},
};
use db::{
    Filter, UnitOfWork,
    models::{
        application_user::ApplicationUser, order_detail::OrderDetail, order_header::OrderHeader,
        shopping_cart::ShoppingCart,
    },
};
use uuid::Uuid;

use crate::{
    dtos::checkout::{CheckoutRequest, CheckoutResponse},
    services::gateway::{CheckoutUrls, PaymentGateway},
};

/// Company accounts pay within this many days of ordering.
pub const PAYMENT_TERMS_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingDetails {
    pub name: String,
    pub phone_number: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl ShippingDetails {
    /// Takes each field from the request, falling back to the user's profile.
    pub fn resolve(req: &CheckoutRequest, user: &ApplicationUser) -> Res<Self> {
        Ok(ShippingDetails {
            name: pick("name", &req.name, &Some(user.name.clone()))?,
            phone_number: pick("phone_number", &req.phone_number, &user.phone_number)?,
            street_address: pick("street_address", &req.street_address, &user.street_address)?,
            city: pick("city", &req.city, &user.city)?,
            state: pick("state", &req.state, &user.state)?,
            postal_code: pick("postal_code", &req.postal_code, &user.postal_code)?,
        })
    }
}

fn pick(field: &str, given: &Option<String>, fallback: &Option<String>) -> Res<String> {
    [given, fallback]
        .into_iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", field)))
}

/// Company accounts get delayed payment terms instead of paying up front.
pub fn is_company_account(user: &ApplicationUser) -> bool {
    user.company_id.is_some_and(|id| id != 0)
}

/// Builds an unsaved order from the user's carts. Carts must have their
/// product loaded; the header id and detail header ids are left at 0.
pub fn build_order(
    user: &ApplicationUser,
    shipping: ShippingDetails,
    carts: &[ShoppingCart],
    now: DateTime<Utc>,
) -> Res<(OrderHeader, Vec<OrderDetail>)> {
    if carts.is_empty() {
        return Err(AppError::BadRequest("Shopping cart is empty".to_string()));
    }

    let mut details = Vec::with_capacity(carts.len());
    for cart in carts {
        let price = cart.unit_price().ok_or_else(|| {
            AppError::Internal(format!("Cart {} was loaded without its product", cart.id))
        })?;
        details.push(OrderDetail {
            id: 0,
            order_header_id: 0,
            product_id: cart.product_id,
            count: cart.count,
            price,
            product: cart.product.clone(),
        });
    }
    let order_total = details.iter().map(|d| d.price * f64::from(d.count)).sum();

    let (order_status, payment_status, payment_due_date) = if is_company_account(user) {
        (
            OrderStatus::Approved,
            PaymentStatus::DelayedPayment,
            Some(now + Duration::days(PAYMENT_TERMS_DAYS)),
        )
    } else {
        (OrderStatus::Pending, PaymentStatus::Pending, None)
    };

    let header = OrderHeader {
        id: 0,
        application_user_id: user.id,
        order_date: now,
        shipping_date: None,
        order_total,
        order_status: Some(order_status.to_string()),
        payment_status: Some(payment_status.to_string()),
        tracking_number: None,
        carrier: None,
        payment_date: None,
        payment_due_date,
        session_id: None,
        payment_intent_id: None,
        phone_number: shipping.phone_number,
        street_address: shipping.street_address,
        city: shipping.city,
        state: shipping.state,
        postal_code: shipping.postal_code,
        name: shipping.name,
        application_user: None,
    };
    Ok((header, details))
}

/// Turns the user's carts into an order.
///
/// The header key is reserved up front so the payment page can point back at
/// the order before anything is written. Header, details and the session id
/// are then committed in a single save; a gateway failure leaves no order
/// behind. Company accounts are approved for delayed payment without
/// contacting the gateway.
pub async fn place_order<G: PaymentGateway>(
    uow: &mut UnitOfWork,
    gateway: &G,
    user_id: Uuid,
    req: &CheckoutRequest,
    public_base_url: &str,
    now: DateTime<Utc>,
) -> Res<CheckoutResponse> {
    let user = uow.users().get_one(Filter::by_id(user_id), false).await?;
    let carts = uow.shopping_carts().for_user(user_id).await?;
    let shipping = ShippingDetails::resolve(req, &user)?;
    let (mut header, mut details) = build_order(&user, shipping, &carts, now)?;

    header.id = uow.order_headers().reserve_id().await?;
    for detail in details.iter_mut() {
        detail.order_header_id = header.id;
    }

    let checkout = if is_company_account(&user) {
        None
    } else {
        let urls = CheckoutUrls::for_order(public_base_url, header.id);
        Some(gateway.create_session(&header, &details, &urls).await?)
    };

    uow.order_headers().add(header.clone());
    let mut repo = uow.order_details();
    for detail in details {
        repo.add(detail);
    }
    if let Some(checkout) = &checkout {
        uow.order_headers()
            .update_stripe_payment_id(header.id, Some(checkout.session_id.clone()), None);
    }
    uow.save().await?;
    log::info!(
        "Order {} placed by {} for {:.2}",
        header.id,
        user.id,
        header.order_total
    );

    Ok(CheckoutResponse {
        order_id: header.id,
        order_total: header.order_total,
        payment_url: checkout.map(|c| c.url),
    })
}

/// Settles an order after the buyer returns from the payment page.
///
/// Paid sessions approve the order and record the payment intent. Orders on
/// delayed payment terms are not checked with the gateway. Either way the
/// buyer's carts are emptied.
pub async fn confirm_order<G: PaymentGateway>(
    uow: &mut UnitOfWork,
    gateway: &G,
    order_id: i32,
    principal: &Principal,
) -> Res<OrderHeader> {
    let header = uow
        .order_headers()
        .get_one(Filter::by_id(order_id), false)
        .await?;
    if header.application_user_id != principal.user_id
        && !principal.is_in_any_role(&[Role::Admin, Role::Employee])
    {
        return Err(AppError::Forbidden(
            "You don't have permission to access this order".to_string(),
        ));
    }

    let delayed = header.payment_status.as_deref() == Some(PaymentStatus::DelayedPayment.as_str());
    if let (false, Some(session_id)) = (delayed, header.session_id.as_deref()) {
        let confirmation = gateway.confirm(session_id).await?;
        if confirmation.paid {
            let mut orders = uow.order_headers();
            orders.update_stripe_payment_id(
                order_id,
                Some(session_id.to_string()),
                confirmation.payment_intent_id,
            );
            orders.update_status(order_id, OrderStatus::Approved, Some(PaymentStatus::Approved));
        } else {
            log::warn!("Checkout session for order {} is not paid", order_id);
        }
    }

    let carts = uow
        .shopping_carts()
        .get_all(
            Some(Filter::new().eq("application_user_id", header.application_user_id)),
            false,
        )
        .await?;
    uow.shopping_carts().remove_range(carts);
    uow.save().await?;

    uow.order_headers()
        .get_one(Filter::by_id(order_id), false)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use db::models::product::Product;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn user(company_id: Option<i32>) -> ApplicationUser {
        let mut user = ApplicationUser::new("buyer@example.com", "Bea Buyer");
        user.street_address = Some("1 Main St".to_string());
        user.city = Some("Springfield".to_string());
        user.state = Some("IL".to_string());
        user.postal_code = Some("62701".to_string());
        user.phone_number = Some("555-0100".to_string());
        user.company_id = company_id;
        user
    }

    fn cart(product_id: i32, count: i32) -> ShoppingCart {
        ShoppingCart {
            id: product_id,
            product_id,
            count,
            application_user_id: Uuid::nil(),
            product: Some(Product {
                id: product_id,
                title: format!("Book {}", product_id),
                description: None,
                isbn: "ISBN".to_string(),
                author: "Author".to_string(),
                list_price: 12.0,
                price: 10.0,
                price50: 8.0,
                price100: 6.0,
                category_id: 1,
                image_url: None,
                category: None,
            }),
        }
    }

    fn shipping(user: &ApplicationUser) -> ShippingDetails {
        ShippingDetails::resolve(&CheckoutRequest::default(), user).unwrap()
    }

    #[test]
    fn customer_order_is_pending_with_tiered_total() {
        let user = user(None);
        let (header, details) =
            build_order(&user, shipping(&user), &[cart(1, 2), cart(2, 60), cart(3, 101)], now())
                .unwrap();

        assert_eq!(header.order_status.as_deref(), Some("Pending"));
        assert_eq!(header.payment_status.as_deref(), Some("Pending"));
        assert_eq!(header.payment_due_date, None);
        assert_eq!(header.application_user_id, user.id);
        assert_eq!(details.len(), 3);
        assert_eq!(details[1].price, 8.0);
        assert_eq!(details[2].price, 6.0);
        assert_eq!(header.order_total, 2.0 * 10.0 + 60.0 * 8.0 + 101.0 * 6.0);
    }

    #[test]
    fn company_order_is_approved_for_delayed_payment() {
        let user = user(Some(4));
        let (header, _) = build_order(&user, shipping(&user), &[cart(1, 1)], now()).unwrap();

        assert_eq!(header.order_status.as_deref(), Some("Approved"));
        assert_eq!(
            header.payment_status.as_deref(),
            Some("ApprovedForDelayedPayment")
        );
        assert_eq!(header.payment_due_date, Some(now() + Duration::days(30)));
    }

    #[test]
    fn empty_cart_cannot_be_checked_out() {
        let user = user(None);
        let err = build_order(&user, shipping(&user), &[], now()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn cart_without_product_is_rejected() {
        let user = user(None);
        let mut bare = cart(1, 1);
        bare.product = None;
        assert!(build_order(&user, shipping(&user), &[bare], now()).is_err());
    }

    #[test]
    fn shipping_prefers_request_over_profile() {
        let user = user(None);
        let req = CheckoutRequest {
            name: Some("Gift Recipient".to_string()),
            city: Some("   ".to_string()),
            ..Default::default()
        };
        let details = ShippingDetails::resolve(&req, &user).unwrap();
        assert_eq!(details.name, "Gift Recipient");
        assert_eq!(details.city, "Springfield");
    }

    #[test]
    fn missing_shipping_field_is_a_bad_request() {
        let mut user = user(None);
        user.postal_code = None;
        let err = ShippingDetails::resolve(&CheckoutRequest::default(), &user).unwrap_err();
        assert!(err.to_string().contains("postal_code"), "{err}");
    }
}
