use {
    super::{
        side_effects::SideEffectCoordinator,
        status_sync::{self, SyncOutcome},
    },
    crate::{
        domain::{
            audit::{Actor, CommitContext},
            error::{StoreError, WebhookError},
            event::LifecycleEventType,
            ports::PaymentStore,
            webhook::WebhookDecoder,
        },
        infra::metrics::PaymentMetrics,
    },
    std::sync::Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Status moved; side effects fanned out.
    Applied,
    /// Record already had this status.
    Unchanged,
    /// Stale or duplicate event refused by the transition guard.
    Rejected,
    /// No stored payment for the event's reference.
    UnknownReference,
    /// Event type not modelled.
    Ignored,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Rejected => "rejected",
            Self::UnknownReference => "unknown_reference",
            Self::Ignored => "ignored",
        }
    }
}

pub struct WebhookReconciler {
    decoder: Arc<dyn WebhookDecoder>,
    store: Arc<dyn PaymentStore>,
    side_effects: Arc<SideEffectCoordinator>,
    metrics: PaymentMetrics,
    max_attempts: u32,
}

impl WebhookReconciler {
    pub fn new(
        decoder: Arc<dyn WebhookDecoder>,
        store: Arc<dyn PaymentStore>,
        side_effects: Arc<SideEffectCoordinator>,
        metrics: PaymentMetrics,
    ) -> Self {
        Self {
            decoder,
            store,
            side_effects,
            metrics,
            max_attempts: status_sync::DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Only signature and payload problems (400) and unsettled store errors
    /// (500, so the gateway redelivers) surface as errors. Everything else
    /// is acknowledged.
    #[tracing::instrument(
        name = "webhook",
        skip_all,
        fields(
            event_id = tracing::field::Empty,
            event_type = tracing::field::Empty,
            reference = tracing::field::Empty
        )
    )]
    pub async fn handle_event(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        source_ip: Option<&str>,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let result = self.reconcile(payload, signature_header, source_ip).await;
        let label = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(WebhookError::Signature(_)) => "invalid_signature",
            Err(WebhookError::Payload(_)) => "malformed",
            Err(WebhookError::Store(_) | WebhookError::Contended(_)) => "failed",
        };
        self.metrics.webhook_event(label);
        result
    }

    async fn reconcile(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        source_ip: Option<&str>,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let event = self.decoder.decode(payload, signature_header).inspect_err(|err| {
            tracing::warn!(error = %err, "webhook rejected");
        })?;

        tracing::Span::current()
            .record("event_id", tracing::field::display(&event.id))
            .record("event_type", tracing::field::display(&event.event_type));

        let Some(change) = event.change else {
            tracing::debug!("event type not handled, acknowledging");
            return Ok(ReconcileOutcome::Ignored);
        };
        tracing::Span::current().record("reference", tracing::field::display(&change.reference));

        let outcome = status_sync::apply_status(
            self.store.as_ref(),
            &change.reference,
            &change.update,
            self.max_attempts,
        )
        .await
        .map_err(|err| match err {
            StoreError::Conflict { reference, .. } => WebhookError::Contended(reference),
            other => {
                tracing::error!(error = %other, "status update failed");
                WebhookError::Store(other)
            }
        })?;

        match outcome {
            SyncOutcome::Applied { previous, current } => {
                tracing::info!(
                    from = %previous.status(),
                    to = %current.status(),
                    version = current.version(),
                    "payment status updated"
                );
                let context = CommitContext::new(Actor::stripe_webhook(), source_ip.map(str::to_string));
                self.side_effects
                    .after_commit(&current, LifecycleEventType::Updated, Some(&previous), &context)
                    .await;
                Ok(ReconcileOutcome::Applied)
            }
            SyncOutcome::Unchanged(record) => {
                tracing::debug!(status = %record.status(), "status already current");
                Ok(ReconcileOutcome::Unchanged)
            }
            SyncOutcome::Rejected { .. } => Ok(ReconcileOutcome::Rejected),
            SyncOutcome::Missing => {
                tracing::info!("no payment for reference, ignoring");
                Ok(ReconcileOutcome::UnknownReference)
            }
        }
    }
}
