use {
    super::event::LifecycleEventType,
    super::payment::{PaymentRecord, PaymentStatus},
    chrono::{DateTime, Utc},
    derive_more::Display,
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Who caused a transition.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Actor {
    #[display("system")]
    System,
    #[display("user:{_0}")]
    User(String),
    #[display("webhook:{_0}")]
    Webhook(String),
}

impl Actor {
    pub fn stripe_webhook() -> Self {
        Self::Webhook("stripe".into())
    }
}

/// Who and from where, carried from the entry point down to the audit sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitContext {
    pub actor: Actor,
    pub source_ip: Option<String>,
}

impl CommitContext {
    pub fn new(actor: Actor, source_ip: Option<String>) -> Self {
        Self { actor, source_ip }
    }

    pub fn system() -> Self {
        Self::new(Actor::System, None)
    }
}

/// One applied transition. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub external_reference: String,
    pub event_type: LifecycleEventType,
    pub previous_status: Option<PaymentStatus>,
    pub new_status: PaymentStatus,
    pub actor: String,
    pub source_ip: Option<String>,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn for_transition(
        record: &PaymentRecord,
        event_type: LifecycleEventType,
        previous: Option<&PaymentRecord>,
        context: &CommitContext,
    ) -> Self {
        let previous_status = previous.map(PaymentRecord::status);
        let message = match previous_status {
            Some(from) => format!(
                "Payment {}: {} {} → {}",
                event_type,
                record.external_reference(),
                from,
                record.status()
            ),
            None => format!(
                "Payment {}: {} {}",
                event_type,
                record.external_reference(),
                record.status()
            ),
        };

        Self {
            id: Uuid::now_v7(),
            external_reference: record.external_reference().to_string(),
            event_type,
            previous_status,
            new_status: record.status(),
            actor: context.actor.to_string(),
            source_ip: context.source_ip.clone(),
            message,
            metadata: serde_json::json!({
                "amount": record.money().amount().to_string(),
                "currency": record.money().currency().as_str(),
                "user_id": record.user_id(),
                "version": record.version(),
            }),
            created_at: Utc::now(),
        }
    }
}

/// Filters for the audit read API. Unset fields match everything; the time
/// window is inclusive on both ends.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub reference: Option<String>,
    pub actor: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditQuery {
    pub fn for_reference(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.reference
            .as_ref()
            .is_none_or(|r| *r == entry.external_reference)
            && self.actor.as_ref().is_none_or(|a| *a == entry.actor)
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at <= to)
    }
}
