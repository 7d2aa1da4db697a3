use {
    crate::{
        domain::{
            audit::{AuditEntry, CommitContext},
            event::{LifecycleEvent, LifecycleEventType},
            payment::PaymentRecord,
            ports::{AuditLog, EventPublisher, PaymentCache, SearchIndex},
            search::SearchProjection,
        },
        infra::metrics::PaymentMetrics,
    },
    std::sync::Arc,
};

pub const SINK_CACHE: &str = "cache";
pub const SINK_AUDIT: &str = "audit";
pub const SINK_SEARCH: &str = "search";
pub const SINK_BUS: &str = "bus";

/// Post-commit fan-out. Each sink runs independently; a failure is logged and
/// counted but never reaches the caller, and nothing is retried.
pub struct SideEffectCoordinator {
    cache: Arc<dyn PaymentCache>,
    audit: Arc<dyn AuditLog>,
    search: Arc<dyn SearchIndex>,
    publisher: Arc<dyn EventPublisher>,
    metrics: PaymentMetrics,
}

impl SideEffectCoordinator {
    pub fn new(
        cache: Arc<dyn PaymentCache>,
        audit: Arc<dyn AuditLog>,
        search: Arc<dyn SearchIndex>,
        publisher: Arc<dyn EventPublisher>,
        metrics: PaymentMetrics,
    ) -> Self {
        Self {
            cache,
            audit,
            search,
            publisher,
            metrics,
        }
    }

    pub async fn after_commit(
        &self,
        record: &PaymentRecord,
        event_type: LifecycleEventType,
        previous: Option<&PaymentRecord>,
        context: &CommitContext,
    ) {
        let reference = record.external_reference();

        let (cache, audit, search, bus) = tokio::join!(
            self.cache.invalidate(reference, record.version()),
            self.audit
                .append(AuditEntry::for_transition(record, event_type, previous, context)),
            self.search.upsert(SearchProjection::from(record)),
            self.publisher
                .publish(LifecycleEvent::new(record, event_type, previous)),
        );

        for (sink, result) in [
            (SINK_CACHE, cache),
            (SINK_AUDIT, audit),
            (SINK_SEARCH, search),
            (SINK_BUS, bus),
        ] {
            if let Err(err) = result {
                tracing::error!(
                    reference = %reference,
                    event_type = %event_type,
                    sink,
                    status = %record.status(),
                    error = %err,
                    "side effect failed"
                );
                self.metrics.side_effect_failed(sink);
            }
        }
    }
}
