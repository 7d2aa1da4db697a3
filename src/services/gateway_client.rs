use {
    crate::domain::{
        charge::{ChargeLimits, ChargeRequest, ValidatedCharge},
        error::{GatewayClientError, GatewayError, GatewayErrorKind, ValidationError},
        id::ExternalReference,
        money::{Currency, Money},
        payment::PaymentStatus,
        provider::{ChargeGateway, GatewayCharge, GatewayChargeRequest},
    },
    std::{collections::HashMap, future::Future, sync::Arc, time::Duration},
    tokio::time::Instant,
    uuid::Uuid,
};

/// Bounded exponential backoff for one kind of gateway operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    /// Deadline for a single call.
    pub call_timeout: Duration,
    /// Ceiling for the whole operation, backoff included.
    pub total_timeout: Duration,
}

impl RetryPolicy {
    pub fn charge() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
            call_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(30),
        }
    }

    pub fn confirmation() -> Self {
        Self {
            max_attempts: 2,
            ..Self::charge()
        }
    }

    pub fn with_timeouts(mut self, call_timeout: Duration, total_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self.total_timeout = total_timeout;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Sleep before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// A gateway charge mapped back to decimal money.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayChargeResult {
    pub reference: ExternalReference,
    pub money: Money,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    pub receipt_url: Option<String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl GatewayChargeResult {
    fn from_gateway(charge: GatewayCharge) -> Result<Self, GatewayError> {
        let currency = Currency::new(&charge.currency).map_err(|e| {
            GatewayError::new(
                GatewayErrorKind::Api,
                format!("gateway returned an unusable currency: {e}"),
            )
        })?;

        Ok(Self {
            reference: charge.reference,
            money: Money::from_minor_units(charge.minor_amount, currency),
            status: charge.status,
            client_secret: charge.client_secret,
            receipt_url: charge.receipt_url,
            customer_id: charge.customer_id,
            description: charge.description,
            metadata: charge.metadata,
        })
    }
}

/// Validation, minor-unit conversion and retry around a [`ChargeGateway`].
pub struct GatewayClient {
    gateway: Arc<dyn ChargeGateway>,
    limits: ChargeLimits,
    charge_policy: RetryPolicy,
    confirm_policy: RetryPolicy,
}

impl GatewayClient {
    pub fn new(gateway: Arc<dyn ChargeGateway>, limits: ChargeLimits) -> Self {
        Self {
            gateway,
            limits,
            charge_policy: RetryPolicy::charge(),
            confirm_policy: RetryPolicy::confirmation(),
        }
    }

    pub fn with_policies(mut self, charge: RetryPolicy, confirm: RetryPolicy) -> Self {
        self.charge_policy = charge;
        self.confirm_policy = confirm;
        self
    }

    pub fn limits(&self) -> &ChargeLimits {
        &self.limits
    }

    pub fn validate(&self, request: &ChargeRequest) -> Result<ValidatedCharge, ValidationError> {
        self.limits.validate(request)
    }

    pub async fn create_charge(
        &self,
        request: &ChargeRequest,
    ) -> Result<GatewayChargeResult, GatewayClientError> {
        let charge = self.validate(request)?;
        self.submit_charge(&charge).await
    }

    /// Sends an already validated charge. One idempotency key covers every
    /// attempt so a retried create can't produce a second charge.
    pub async fn submit_charge(
        &self,
        charge: &ValidatedCharge,
    ) -> Result<GatewayChargeResult, GatewayClientError> {
        let request = GatewayChargeRequest {
            minor_amount: charge.minor_amount,
            currency: charge.money.currency().clone(),
            payment_method_ref: charge.payment_method_ref.clone(),
            email: charge.email.clone(),
            description: charge.description(),
            metadata: HashMap::from([
                ("user_id".to_string(), charge.user_id.clone()),
                ("plan_id".to_string(), charge.plan_id.clone()),
            ]),
            save_payment_method: charge.save_payment_method,
        };
        let idempotency_key = format!("charge_{}", Uuid::now_v7());

        let raw = with_retry("create_charge", &self.charge_policy, || {
            self.gateway.create_charge(&request, &idempotency_key)
        })
        .await?;

        GatewayChargeResult::from_gateway(raw).map_err(GatewayClientError::Terminal)
    }

    pub async fn confirm_charge(
        &self,
        reference: &ExternalReference,
    ) -> Result<GatewayChargeResult, GatewayClientError> {
        let raw = with_retry("confirm_charge", &self.confirm_policy, || {
            self.gateway.confirm_charge(reference)
        })
        .await?;

        GatewayChargeResult::from_gateway(raw).map_err(GatewayClientError::Terminal)
    }
}

/// Runs `call` until it succeeds, fails terminally, runs out of attempts, or
/// the next backoff would cross the operation's total deadline.
async fn with_retry<F, Fut>(
    operation: &'static str,
    policy: &RetryPolicy,
    call: F,
) -> Result<GatewayCharge, GatewayClientError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<GatewayCharge, GatewayError>>,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let remaining = policy.total_timeout.saturating_sub(started.elapsed());
        let deadline = policy.call_timeout.min(remaining);

        let err = match tokio::time::timeout(deadline, call()).await {
            Ok(Ok(charge)) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "gateway call succeeded after retry");
                }
                return Ok(charge);
            }
            Ok(Err(err)) => err,
            Err(_elapsed) => GatewayError::new(
                GatewayErrorKind::Timeout,
                format!("no response within {} ms", deadline.as_millis()),
            ),
        };

        if !err.is_transient() {
            tracing::warn!(operation, attempt, code = err.code(), error = %err, "terminal gateway error");
            return Err(GatewayClientError::Terminal(err));
        }

        let delay = policy.delay_for(attempt);
        if attempt >= policy.max_attempts || started.elapsed() + delay >= policy.total_timeout {
            tracing::error!(operation, attempts = attempt, error = %err, "gateway retries exhausted");
            return Err(GatewayClientError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }

        tracing::warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient gateway error, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
