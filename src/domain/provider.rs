use {
    super::error::GatewayError,
    super::id::ExternalReference,
    super::money::Currency,
    super::payment::PaymentStatus,
    std::{collections::HashMap, future::Future, pin::Pin},
};

/// What we send to the gateway. Amount is already in minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayChargeRequest {
    pub minor_amount: i64,
    pub currency: Currency,
    pub payment_method_ref: String,
    pub email: String,
    pub description: String,
    pub metadata: HashMap<String, String>,
    pub save_payment_method: bool,
}

/// What the gateway reports back, before conversion to decimal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCharge {
    pub reference: ExternalReference,
    pub minor_amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    pub receipt_url: Option<String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
}

pub type GatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<GatewayCharge, GatewayError>> + Send + 'a>>;

/// One raw call to the payment gateway. No retries, no timeouts: those live in
/// the gateway client that wraps this.
pub trait ChargeGateway: Send + Sync {
    fn create_charge<'a>(
        &'a self,
        request: &'a GatewayChargeRequest,
        idempotency_key: &'a str,
    ) -> GatewayFuture<'a>;

    fn confirm_charge<'a>(&'a self, reference: &'a ExternalReference) -> GatewayFuture<'a>;
}
