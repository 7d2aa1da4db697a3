#![allow(dead_code)]

use async_trait::async_trait;
use payflow::AppState;
use payflow::adapters::stripe::{signature, webhook::StripeWebhookDecoder};
use payflow::domain::audit::{AuditEntry, AuditQuery};
use payflow::domain::charge::{ChargeLimits, ChargeRequest};
use payflow::domain::error::{GatewayError, GatewayErrorKind, SinkError, WebhookError};
use payflow::domain::event::LifecycleEvent;
use payflow::domain::id::ExternalReference;
use payflow::domain::money::Currency;
use payflow::domain::payment::{PaymentRecord, PaymentStatus};
use payflow::domain::ports::{AuditLog, EventPublisher, PaymentCache, SearchIndex};
use payflow::domain::provider::{
    ChargeGateway, GatewayCharge, GatewayChargeRequest, GatewayFuture,
};
use payflow::domain::search::{PageRequest, SearchPage, SearchProjection, SearchQuery};
use payflow::infra::memory::{
    BroadcastPublisher, InMemoryAuditLog, InMemoryPaymentCache, InMemoryPaymentStore,
    InMemorySearchIndex,
};
use payflow::infra::metrics::PaymentMetrics;
use payflow::services::gateway_client::{GatewayClient, RetryPolicy};
use payflow::services::payment_lifecycle::PaymentLifecycleService;
use payflow::services::side_effects::SideEffectCoordinator;
use payflow::services::webhook_reconciler::{ReconcileOutcome, WebhookReconciler};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

// ── Scripted gateway ───────────────────────────────────────────────────────

pub enum Step {
    Reply(Result<GatewayCharge, GatewayError>),
    /// Never answers; only the call deadline ends it.
    Hang,
}

/// Gateway double. Answers from a script and records every call it sees.
/// An unscripted call fails with a terminal `invalid_request_error`.
#[derive(Default)]
pub struct ScriptedGateway {
    creates: Mutex<VecDeque<Step>>,
    confirms: Mutex<VecDeque<Step>>,
    create_calls: Mutex<Vec<(GatewayChargeRequest, String)>>,
    confirm_calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn on_create(&self, step: Step) -> &Self {
        self.creates.lock().unwrap().push_back(step);
        self
    }

    pub fn on_confirm(&self, step: Step) -> &Self {
        self.confirms.lock().unwrap().push_back(step);
        self
    }

    pub fn create_calls(&self) -> Vec<(GatewayChargeRequest, String)> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn confirm_calls(&self) -> Vec<String> {
        self.confirm_calls.lock().unwrap().clone()
    }

    fn next(queue: &Mutex<VecDeque<Step>>) -> GatewayFuture<'static> {
        match queue.lock().unwrap().pop_front() {
            Some(Step::Reply(reply)) => Box::pin(async move { reply }),
            Some(Step::Hang) => {
                Box::pin(std::future::pending::<Result<GatewayCharge, GatewayError>>())
            }
            None => Box::pin(async {
                Err::<GatewayCharge, _>(GatewayError::new(
                    GatewayErrorKind::InvalidRequest,
                    "unscripted gateway call",
                ))
            }),
        }
    }
}

impl ChargeGateway for ScriptedGateway {
    fn create_charge<'a>(
        &'a self,
        request: &'a GatewayChargeRequest,
        idempotency_key: &'a str,
    ) -> GatewayFuture<'a> {
        self.create_calls
            .lock()
            .unwrap()
            .push((request.clone(), idempotency_key.to_string()));
        Self::next(&self.creates)
    }

    fn confirm_charge<'a>(&'a self, reference: &'a ExternalReference) -> GatewayFuture<'a> {
        self.confirm_calls
            .lock()
            .unwrap()
            .push(reference.to_string());
        Self::next(&self.confirms)
    }
}

pub fn ok(charge: GatewayCharge) -> Step {
    Step::Reply(Ok(charge))
}

pub fn fail(kind: GatewayErrorKind) -> Step {
    Step::Reply(Err(GatewayError::new(kind, format!("scripted {kind}"))))
}

/// A gateway charge as the Stripe adapter would report it.
pub fn gateway_charge(
    reference: &str,
    minor_amount: i64,
    currency: &str,
    status: PaymentStatus,
) -> GatewayCharge {
    GatewayCharge {
        reference: ExternalReference::new(reference).unwrap(),
        minor_amount,
        currency: currency.to_string(),
        status,
        client_secret: Some(format!("{reference}_secret_abc")),
        receipt_url: None,
        customer_id: None,
        description: None,
        metadata: HashMap::from([
            ("user_id".to_string(), "42".to_string()),
            ("plan_id".to_string(), "premium".to_string()),
        ]),
    }
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn charge_request(amount: &str, currency: &str) -> ChargeRequest {
    ChargeRequest {
        user_id: "42".into(),
        plan_id: "premium".into(),
        payment_method_ref: "pm_card_visa".into(),
        email: "user@example.com".into(),
        amount: dec(amount),
        currency: currency.into(),
        save_payment_method: false,
    }
}

pub fn reference(s: &str) -> ExternalReference {
    ExternalReference::new(s).unwrap()
}

pub fn limits() -> ChargeLimits {
    ChargeLimits::new(
        Decimal::from(1_000_000),
        ["USD", "EUR", "GBP", "JPY"]
            .into_iter()
            .map(|c| Currency::new(c).unwrap())
            .collect(),
    )
}

/// Charge and confirm policies with millisecond backoff.
pub fn fast_policies() -> (RetryPolicy, RetryPolicy) {
    (
        RetryPolicy::charge().with_base_delay(Duration::from_millis(1)),
        RetryPolicy::confirmation().with_base_delay(Duration::from_millis(1)),
    )
}

// ── Failing sink ───────────────────────────────────────────────────────────

/// Stands in for any side-effect sink and fails every call.
pub struct FailingSink;

fn down() -> SinkError {
    SinkError::Unavailable("sink is down".into())
}

#[async_trait]
impl PaymentCache for FailingSink {
    async fn get(&self, _: &ExternalReference) -> Result<Option<PaymentRecord>, SinkError> {
        Err(down())
    }
    async fn put(&self, _: &PaymentRecord) -> Result<(), SinkError> {
        Err(down())
    }
    async fn invalidate(&self, _: &ExternalReference, _: i64) -> Result<(), SinkError> {
        Err(down())
    }
}

#[async_trait]
impl AuditLog for FailingSink {
    async fn append(&self, _: AuditEntry) -> Result<(), SinkError> {
        Err(down())
    }
    async fn query(&self, _: &AuditQuery) -> Result<Vec<AuditEntry>, SinkError> {
        Err(down())
    }
}

#[async_trait]
impl SearchIndex for FailingSink {
    async fn upsert(&self, _: SearchProjection) -> Result<(), SinkError> {
        Err(down())
    }
    async fn search(&self, _: &SearchQuery, _: PageRequest) -> Result<SearchPage, SinkError> {
        Err(down())
    }
    async fn status_counts(&self) -> Result<HashMap<PaymentStatus, u64>, SinkError> {
        Err(down())
    }
}

#[async_trait]
impl EventPublisher for FailingSink {
    async fn publish(&self, _: LifecycleEvent) -> Result<(), SinkError> {
        Err(down())
    }
}

// ── Harness ────────────────────────────────────────────────────────────────

/// Which sinks the harness wires as [`FailingSink`].
#[derive(Default, Clone, Copy)]
pub struct Failing {
    pub cache: bool,
    pub audit: bool,
    pub search: bool,
    pub bus: bool,
}

/// Services wired over in-memory infrastructure and a scripted gateway.
pub struct Harness {
    pub gateway: Arc<ScriptedGateway>,
    pub store: InMemoryPaymentStore,
    pub cache: InMemoryPaymentCache,
    pub audit: InMemoryAuditLog,
    pub search: InMemorySearchIndex,
    pub events: broadcast::Receiver<String>,
    pub metrics: PaymentMetrics,
    pub payments: Arc<PaymentLifecycleService>,
    pub webhooks: Arc<WebhookReconciler>,
    audit_port: Arc<dyn AuditLog>,
    search_port: Arc<dyn SearchIndex>,
}

fn plain_search(search: InMemorySearchIndex) -> Arc<dyn SearchIndex> {
    Arc::new(search)
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Failing::default(), fast_policies(), plain_search)
    }

    pub fn failing(failing: Failing) -> Self {
        Self::build(failing, fast_policies(), plain_search)
    }

    /// Production retry timings; pair with `start_paused`.
    pub fn with_default_policies() -> Self {
        Self::build(
            Failing::default(),
            (RetryPolicy::charge(), RetryPolicy::confirmation()),
            plain_search,
        )
    }

    /// Routes side-effect upserts through `wrap`; `self.search` still reads
    /// the underlying index.
    pub fn with_search(wrap: impl FnOnce(InMemorySearchIndex) -> Arc<dyn SearchIndex>) -> Self {
        Self::build(Failing::default(), fast_policies(), wrap)
    }

    fn build(
        failing: Failing,
        (charge, confirm): (RetryPolicy, RetryPolicy),
        wrap_search: impl FnOnce(InMemorySearchIndex) -> Arc<dyn SearchIndex>,
    ) -> Self {
        let gateway = Arc::new(ScriptedGateway::default());
        let store = InMemoryPaymentStore::new();
        let cache = InMemoryPaymentCache::new();
        let audit = InMemoryAuditLog::new();
        let search = InMemorySearchIndex::new();
        let bus = BroadcastPublisher::new(64);
        let events = bus.subscribe();
        let metrics = PaymentMetrics::new().unwrap();

        let cache_port: Arc<dyn PaymentCache> = if failing.cache {
            Arc::new(FailingSink)
        } else {
            Arc::new(cache.clone())
        };
        let audit_port: Arc<dyn AuditLog> = if failing.audit {
            Arc::new(FailingSink)
        } else {
            Arc::new(audit.clone())
        };
        let search_port: Arc<dyn SearchIndex> = if failing.search {
            Arc::new(FailingSink)
        } else {
            wrap_search(search.clone())
        };
        let bus_port: Arc<dyn EventPublisher> = if failing.bus {
            Arc::new(FailingSink)
        } else {
            Arc::new(bus)
        };

        let side_effects = Arc::new(SideEffectCoordinator::new(
            cache_port.clone(),
            audit_port.clone(),
            search_port.clone(),
            bus_port,
            metrics.clone(),
        ));

        let client = GatewayClient::new(gateway.clone(), limits()).with_policies(charge, confirm);
        let payments = Arc::new(PaymentLifecycleService::new(
            client,
            Arc::new(store.clone()),
            cache_port,
            side_effects.clone(),
            metrics.clone(),
        ));
        let webhooks = Arc::new(WebhookReconciler::new(
            Arc::new(StripeWebhookDecoder::new(WEBHOOK_SECRET, 300)),
            Arc::new(store.clone()),
            side_effects,
            metrics.clone(),
        ));

        Self {
            gateway,
            store,
            cache,
            audit,
            search,
            events,
            metrics,
            payments,
            webhooks,
            audit_port,
            search_port,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            payments: self.payments.clone(),
            webhooks: self.webhooks.clone(),
            audit: self.audit_port.clone(),
            search: self.search_port.clone(),
            metrics: self.metrics.clone(),
        }
    }

    pub async fn audit_for(&self, reference: &str) -> Vec<AuditEntry> {
        self.audit
            .query(&AuditQuery::for_reference(reference))
            .await
            .unwrap()
    }

    /// Lifecycle events published so far, decoded.
    pub fn drain_events(&mut self) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(raw) = self.events.try_recv() {
            out.push(serde_json::from_str(&raw).unwrap());
        }
        out
    }

    /// Delivers a correctly signed webhook straight to the reconciler.
    pub async fn deliver(
        &self,
        body: &serde_json::Value,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let (payload, header) = signed(body);
        self.webhooks
            .handle_event(&payload, Some(&header), Some("54.187.174.169"))
            .await
    }
}

// ── Webhook payloads ───────────────────────────────────────────────────────

/// Serializes `body` and signs it with [`WEBHOOK_SECRET`] at the current time.
pub fn signed(body: &serde_json::Value) -> (Vec<u8>, String) {
    let payload = body.to_string().into_bytes();
    let header =
        signature::signature_header(&payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp());
    (payload, header)
}

pub fn payment_intent_event(event_id: &str, event_type: &str, reference: &str) -> serde_json::Value {
    serde_json::json!({
        "id": event_id,
        "type": event_type,
        "created": 1_760_000_000,
        "livemode": false,
        "data": {"object": {
            "id": reference,
            "object": "payment_intent",
            "customer": "cus_test",
            "latest_charge": {
                "id": format!("ch_{reference}"),
                "receipt_url": format!("https://pay.stripe.com/receipts/{reference}")
            }
        }}
    })
}

pub fn refund_event(event_id: &str, reference: &str) -> serde_json::Value {
    serde_json::json!({
        "id": event_id,
        "type": "charge.refunded",
        "created": 1_760_000_100,
        "livemode": false,
        "data": {"object": {
            "id": format!("ch_{reference}"),
            "object": "charge",
            "payment_intent": reference,
            "receipt_url": format!("https://pay.stripe.com/receipts/{reference}/refund")
        }}
    })
}
