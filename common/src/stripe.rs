use stripe::Client;

use crate::env_config::StripeConfig;

/// Builds the process-wide Stripe client from the configured secret key.
pub fn create_client(config: &StripeConfig) -> Client {
    if config.secret_key.is_empty() {
        log::warn!("STRIPE_SECRET_KEY is empty, checkout calls will be rejected by Stripe");
    }
    Client::new(config.secret_key.clone())
}
