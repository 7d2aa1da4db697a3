use {
    super::error::WebhookError,
    super::id::{EventId, ExternalReference},
    super::payment::StatusUpdate,
};

/// Canonical status change carried by a gateway event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub reference: ExternalReference,
    pub update: StatusUpdate,
}

/// A verified, decoded gateway event. `change` is `None` for event types this
/// service does not model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
    pub id: EventId,
    pub event_type: String,
    pub change: Option<StatusChange>,
}

/// Authenticates a raw webhook delivery and maps it onto a [`GatewayEvent`].
pub trait WebhookDecoder: Send + Sync {
    fn decode(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<GatewayEvent, WebhookError>;
}
