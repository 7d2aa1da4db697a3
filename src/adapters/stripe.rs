pub mod client;
pub mod signature;
pub mod webhook;

use crate::domain::{
    error::{GatewayError, GatewayErrorKind},
    money::Currency,
    payment::PaymentStatus,
};

// ── Conversion helpers shared by the client and the webhook decoder ────────

pub fn to_stripe_currency(currency: &Currency) -> Result<stripe::Currency, GatewayError> {
    serde_json::from_value(serde_json::Value::String(currency.as_str().to_lowercase())).map_err(
        |_| {
            GatewayError::new(
                GatewayErrorKind::InvalidRequest,
                format!("currency {currency} is unknown to Stripe"),
            )
        },
    )
}

pub fn from_stripe_currency(currency: stripe::Currency) -> String {
    serde_json::to_value(currency)
        .ok()
        .and_then(|v| v.as_str().map(str::to_uppercase))
        .unwrap_or_default()
}

pub fn convert_pi_status(status: stripe::PaymentIntentStatus) -> PaymentStatus {
    #[allow(unreachable_patterns)]
    match status {
        stripe::PaymentIntentStatus::RequiresPaymentMethod => PaymentStatus::RequiresPaymentMethod,
        stripe::PaymentIntentStatus::RequiresConfirmation => PaymentStatus::RequiresConfirmation,
        stripe::PaymentIntentStatus::RequiresAction => PaymentStatus::RequiresAction,
        stripe::PaymentIntentStatus::Processing => PaymentStatus::Processing,
        stripe::PaymentIntentStatus::RequiresCapture => PaymentStatus::RequiresCapture,
        stripe::PaymentIntentStatus::Succeeded => PaymentStatus::Succeeded,
        stripe::PaymentIntentStatus::Canceled => PaymentStatus::Canceled,
        other => {
            tracing::warn!("unknown PaymentIntentStatus: {other:?}, defaulting to Processing");
            PaymentStatus::Processing
        }
    }
}

/// Classifies by HTTP status: 429, 401 and 5xx are transient, other 4xx are
/// terminal. Transport failures and timeouts are transient too.
pub fn classify_stripe_error(error: stripe::StripeError) -> GatewayError {
    match error {
        stripe::StripeError::Stripe(request_error) => {
            let status = request_error.http_status;
            let message = request_error
                .message
                .clone()
                .unwrap_or_else(|| format!("Stripe returned HTTP {status}"));
            let kind = match status {
                402 => GatewayErrorKind::Card,
                429 => GatewayErrorKind::RateLimit,
                401 => GatewayErrorKind::Authentication,
                500..=599 => GatewayErrorKind::Api,
                _ => GatewayErrorKind::InvalidRequest,
            };
            GatewayError::new(kind, message)
        }
        stripe::StripeError::Timeout => {
            GatewayError::new(GatewayErrorKind::Timeout, "request timed out")
        }
        stripe::StripeError::ClientError(msg) => {
            GatewayError::new(GatewayErrorKind::Connection, format!("HTTP client error: {msg}"))
        }
        other => GatewayError::new(GatewayErrorKind::InvalidRequest, other.to_string()),
    }
}
