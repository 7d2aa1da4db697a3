use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for the payment core. Cloning shares the underlying series.
#[derive(Clone)]
pub struct PaymentMetrics {
    registry: Registry,
    processed: IntCounter,
    errors: IntCounterVec,
    side_effect_failures: IntCounterVec,
    webhook_events: IntCounterVec,
}

impl PaymentMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let processed = IntCounter::with_opts(Opts::new(
            "payments_processed_total",
            "Charges accepted by the gateway and persisted",
        ))?;
        let errors = IntCounterVec::new(
            Opts::new("payment_errors_total", "Failed charge attempts by error code"),
            &["code"],
        )?;
        let side_effect_failures = IntCounterVec::new(
            Opts::new(
                "payment_side_effect_failures_total",
                "Post-commit sink failures by sink",
            ),
            &["sink"],
        )?;
        let webhook_events = IntCounterVec::new(
            Opts::new(
                "payment_webhook_events_total",
                "Webhook deliveries by reconcile outcome",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(processed.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(side_effect_failures.clone()))?;
        registry.register(Box::new(webhook_events.clone()))?;

        Ok(Self {
            registry,
            processed,
            errors,
            side_effect_failures,
            webhook_events,
        })
    }

    pub fn payment_processed(&self) {
        self.processed.inc();
    }

    pub fn payment_failed(&self, code: &str) {
        self.errors.with_label_values(&[code]).inc();
    }

    pub fn side_effect_failed(&self, sink: &str) {
        self.side_effect_failures.with_label_values(&[sink]).inc();
    }

    pub fn webhook_event(&self, outcome: &str) {
        self.webhook_events.with_label_values(&[outcome]).inc();
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.get()
    }

    pub fn side_effect_failure_count(&self, sink: &str) -> u64 {
        self.side_effect_failures.with_label_values(&[sink]).get()
    }

    pub fn webhook_event_count(&self, outcome: &str) -> u64 {
        self.webhook_events.with_label_values(&[outcome]).get()
    }

    /// Prometheus text exposition of every registered series.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
