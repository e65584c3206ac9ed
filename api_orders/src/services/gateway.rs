use std::future::Future;

use common::{
    env_config::StripeConfig,
    error::{AppError, Res},
};
use db::models::{order_detail::OrderDetail, order_header::OrderHeader};
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency, Expandable,
};

/// Where the payment page sends the buyer afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutUrls {
    pub fn for_order(public_base_url: &str, order_id: i32) -> Self {
        let base = public_base_url.trim_end_matches('/');
        CheckoutUrls {
            success_url: format!("{}/customer/cart/order-confirmation/{}", base, order_id),
            cancel_url: format!("{}/customer/cart", base),
        }
    }
}

/// A hosted payment page created for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRef {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfirmation {
    pub paid: bool,
    pub payment_intent_id: Option<String>,
}

/// External payment processor used by the checkout flow.
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment page for `order`, one line per detail.
    fn create_session(
        &self,
        order: &OrderHeader,
        details: &[OrderDetail],
        urls: &CheckoutUrls,
    ) -> impl Future<Output = Res<CheckoutRef>> + Send;

    /// Looks up the outcome of a payment page opened by `create_session`.
    fn confirm(&self, session_id: &str) -> impl Future<Output = Res<PaymentConfirmation>> + Send;
}

/// Stripe Checkout in payment mode, USD.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(client: Client) -> Self {
        StripeGateway { client }
    }

    pub fn from_config(config: &StripeConfig) -> Self {
        Self::new(common::stripe::create_client(config))
    }
}

impl PaymentGateway for StripeGateway {
    async fn create_session(
        &self,
        order: &OrderHeader,
        details: &[OrderDetail],
        urls: &CheckoutUrls,
    ) -> Res<CheckoutRef> {
        let reference = order.id.to_string();
        let params = CreateCheckoutSession {
            payment_method_types: Some(vec![stripe::CreateCheckoutSessionPaymentMethodTypes::Card]),
            line_items: Some(line_items(details)?),
            mode: Some(CheckoutSessionMode::Payment),
            success_url: Some(urls.success_url.as_str()),
            cancel_url: Some(urls.cancel_url.as_str()),
            client_reference_id: Some(reference.as_str()),
            ..Default::default()
        };
        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(AppError::from)?;

        let url = session.url.ok_or_else(|| {
            AppError::Internal(format!("Checkout session {} has no url", session.id))
        })?;
        log::info!("Created checkout session {} for order {}", session.id, order.id);
        Ok(CheckoutRef {
            session_id: session.id.to_string(),
            url,
        })
    }

    async fn confirm(&self, session_id: &str) -> Res<PaymentConfirmation> {
        let id = session_id.parse::<CheckoutSessionId>().map_err(|e| {
            AppError::Internal(format!(
                "Failed to parse checkout session id: {}. {}",
                session_id, e
            ))
        })?;
        let session = CheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(AppError::from)?;

        let payment_intent_id = session.payment_intent.map(|intent| match intent {
            Expandable::Id(id) => id.to_string(),
            Expandable::Object(intent) => intent.id.to_string(),
        });
        Ok(PaymentConfirmation {
            paid: matches!(session.payment_status, CheckoutSessionPaymentStatus::Paid),
            payment_intent_id,
        })
    }
}

/// Whole cents, rounded to the nearest cent.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Checkout line items priced in cents and named after the product.
pub fn line_items(details: &[OrderDetail]) -> Res<Vec<CreateCheckoutSessionLineItems>> {
    details
        .iter()
        .map(|detail| {
            let quantity = u64::try_from(detail.count).map_err(|_| {
                AppError::BadRequest(format!("Invalid quantity {}", detail.count))
            })?;
            let name = detail
                .product
                .as_ref()
                .map(|product| product.title.clone())
                .unwrap_or_else(|| format!("Product {}", detail.product_id));

            Ok(CreateCheckoutSessionLineItems {
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: Currency::USD,
                    unit_amount: Some(to_cents(detail.price)),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name,
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                quantity: Some(quantity),
                ..Default::default()
            })
        })
        .collect()
}
