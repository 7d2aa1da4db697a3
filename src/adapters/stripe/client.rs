use {
    super::{classify_stripe_error, convert_pi_status, from_stripe_currency, to_stripe_currency},
    crate::domain::{
        error::{GatewayError, GatewayErrorKind},
        id::ExternalReference,
        payment::PaymentStatus,
        provider::{ChargeGateway, GatewayCharge, GatewayChargeRequest, GatewayFuture},
    },
    std::collections::HashMap,
};

const EXPAND_LATEST_CHARGE: &[&str] = &["latest_charge"];

/// PaymentIntent-backed gateway. Each method is a single Stripe round trip
/// (two for a confirm that still needs confirming).
pub struct StripeGateway {
    client: stripe::Client,
}

impl StripeGateway {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: stripe::Client::new(secret_key),
        }
    }

    fn idempotent_client(&self, key: &str) -> stripe::Client {
        self.client
            .clone()
            .with_strategy(stripe::RequestStrategy::Idempotent(key.to_string()))
    }
}

impl ChargeGateway for StripeGateway {
    fn create_charge<'a>(
        &'a self,
        request: &'a GatewayChargeRequest,
        idempotency_key: &'a str,
    ) -> GatewayFuture<'a> {
        Box::pin(self.create_charge_inner(request, idempotency_key))
    }

    fn confirm_charge<'a>(&'a self, reference: &'a ExternalReference) -> GatewayFuture<'a> {
        Box::pin(self.confirm_charge_inner(reference))
    }
}

impl StripeGateway {
    async fn create_charge_inner(
        &self,
        request: &GatewayChargeRequest,
        idempotency_key: &str,
    ) -> Result<GatewayCharge, GatewayError> {
        let payment_method = request
            .payment_method_ref
            .parse::<stripe::PaymentMethodId>()
            .map_err(|e| {
                GatewayError::new(
                    GatewayErrorKind::InvalidRequest,
                    format!("invalid payment method reference: {e}"),
                )
            })?;

        let mut params =
            stripe::CreatePaymentIntent::new(request.minor_amount, to_stripe_currency(&request.currency)?);
        params.payment_method = Some(payment_method);
        params.payment_method_types = Some(vec!["card".to_string()]);
        params.confirm = Some(true);
        params.description = Some(request.description.as_str());
        params.receipt_email = Some(request.email.as_str());
        params.metadata = Some(request.metadata.clone());
        params.expand = EXPAND_LATEST_CHARGE;
        if request.save_payment_method {
            params.setup_future_usage = Some(stripe::PaymentIntentSetupFutureUsage::OffSession);
        }

        let client = self.idempotent_client(idempotency_key);
        let pi = stripe::PaymentIntent::create(&client, params)
            .await
            .map_err(classify_stripe_error)?;

        tracing::debug!(reference = %pi.id, status = ?pi.status, "payment intent created");
        charge_from_pi(&pi)
    }

    async fn confirm_charge_inner(
        &self,
        reference: &ExternalReference,
    ) -> Result<GatewayCharge, GatewayError> {
        let pi_id = reference
            .as_str()
            .parse::<stripe::PaymentIntentId>()
            .map_err(|e| {
                GatewayError::new(
                    GatewayErrorKind::InvalidRequest,
                    format!("invalid PaymentIntent id: {e}"),
                )
            })?;

        let pi = stripe::PaymentIntent::retrieve(&self.client, &pi_id, EXPAND_LATEST_CHARGE)
            .await
            .map_err(classify_stripe_error)?;

        if convert_pi_status(pi.status) != PaymentStatus::RequiresConfirmation {
            return charge_from_pi(&pi);
        }

        let client = self.idempotent_client(&format!("confirm_{}", pi.id));
        let confirmed = stripe::PaymentIntent::confirm(
            &client,
            &pi.id.to_string(),
            stripe::PaymentIntentConfirmParams::default(),
        )
        .await
        .map_err(classify_stripe_error)?;

        tracing::debug!(reference = %confirmed.id, status = ?confirmed.status, "payment intent confirmed");
        charge_from_pi(&confirmed)
    }
}

fn charge_from_pi(pi: &stripe::PaymentIntent) -> Result<GatewayCharge, GatewayError> {
    let reference = ExternalReference::new(pi.id.to_string()).map_err(|e| {
        GatewayError::new(GatewayErrorKind::Api, format!("unusable PaymentIntent id: {e}"))
    })?;

    let receipt_url = pi.latest_charge.as_ref().and_then(|c| match c {
        stripe::Expandable::Id(_) => None,
        stripe::Expandable::Object(charge) => charge.receipt_url.clone(),
    });
    let customer_id = pi.customer.as_ref().map(|c| match c {
        stripe::Expandable::Id(id) => id.to_string(),
        stripe::Expandable::Object(customer) => customer.id.to_string(),
    });
    let metadata = serde_json::to_value(&pi.metadata)
        .ok()
        .and_then(|v| serde_json::from_value::<Option<HashMap<String, String>>>(v).ok())
        .flatten()
        .unwrap_or_default();

    Ok(GatewayCharge {
        reference,
        minor_amount: pi.amount,
        currency: from_stripe_currency(pi.currency),
        status: convert_pi_status(pi.status),
        client_secret: pi.client_secret.clone(),
        receipt_url,
        customer_id,
        description: pi.description.clone(),
        metadata,
    })
}
