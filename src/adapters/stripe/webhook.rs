use {
    super::signature,
    crate::domain::{
        error::WebhookError,
        id::{EventId, ExternalReference},
        payment::{PaymentStatus, StatusUpdate},
        webhook::{GatewayEvent, StatusChange, WebhookDecoder},
    },
    serde::Deserialize,
    serde_json::Value,
};

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String, // evt_xxx
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub livemode: bool,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value, // shape depends on event_type
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    PaymentIntentSucceeded,
    PaymentIntentPaymentFailed,
    PaymentIntentCanceled,
    PaymentIntentProcessing,
    PaymentIntentRequiresAction,
    PaymentIntentAmountCapturableUpdated,
    ChargeRefunded,
    Unknown,
}

impl From<&str> for StripeEventType {
    fn from(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentPaymentFailed,
            "payment_intent.canceled" => Self::PaymentIntentCanceled,
            "payment_intent.processing" => Self::PaymentIntentProcessing,
            "payment_intent.requires_action" => Self::PaymentIntentRequiresAction,
            "payment_intent.amount_capturable_updated" => Self::PaymentIntentAmountCapturableUpdated,
            "charge.refunded" => Self::ChargeRefunded,
            _ => Self::Unknown,
        }
    }
}

impl StripeEventType {
    /// Canonical status an event of this type moves the payment to.
    pub fn target_status(&self) -> Option<PaymentStatus> {
        match self {
            Self::PaymentIntentSucceeded => Some(PaymentStatus::Succeeded),
            Self::PaymentIntentPaymentFailed => Some(PaymentStatus::Failed),
            Self::PaymentIntentCanceled => Some(PaymentStatus::Canceled),
            Self::PaymentIntentProcessing => Some(PaymentStatus::Processing),
            Self::PaymentIntentRequiresAction => Some(PaymentStatus::RequiresAction),
            Self::PaymentIntentAmountCapturableUpdated => Some(PaymentStatus::RequiresCapture),
            Self::ChargeRefunded => Some(PaymentStatus::Refunded),
            Self::Unknown => None,
        }
    }

    fn is_charge(&self) -> bool {
        matches!(self, Self::ChargeRefunded)
    }
}

/// `"id"` or `{"id": ...}`, the two forms of an expandable field.
fn expandable_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) => Some(id.clone()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn str_field(object: &Value, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(str::to_string)
}

fn status_change(kind: StripeEventType, object: &Value) -> Option<StatusChange> {
    let status = kind.target_status()?;

    let (reference, receipt_url) = if kind.is_charge() {
        (
            expandable_id(object.get("payment_intent")),
            str_field(object, "receipt_url"),
        )
    } else {
        (
            str_field(object, "id"),
            object
                .get("latest_charge")
                .and_then(|charge| charge.get("receipt_url"))
                .and_then(Value::as_str)
                .map(str::to_string),
        )
    };

    let reference = match reference.map(ExternalReference::new) {
        Some(Ok(reference)) => reference,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "skipping event with invalid payment reference");
            return None;
        }
        None => {
            tracing::warn!(?kind, "skipping event without payment reference");
            return None;
        }
    };

    Some(StatusChange {
        reference,
        update: StatusUpdate::to(status)
            .with_receipt_url(receipt_url)
            .with_customer_id(expandable_id(object.get("customer"))),
    })
}

/// Verifies and decodes Stripe webhook deliveries.
pub struct StripeWebhookDecoder {
    secret: String,
    tolerance_secs: i64,
}

impl StripeWebhookDecoder {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }
}

impl WebhookDecoder for StripeWebhookDecoder {
    fn decode(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<GatewayEvent, WebhookError> {
        let header = signature_header
            .ok_or_else(|| WebhookError::Signature("missing Stripe-Signature header".into()))?;
        signature::verify(payload, header, &self.secret, self.tolerance_secs)
            .map_err(WebhookError::Signature)?;

        let event: StripeEvent =
            serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))?;
        let id = EventId::new(event.id).map_err(|e| WebhookError::Payload(e.to_string()))?;
        let kind = StripeEventType::from(event.event_type.as_str());

        Ok(GatewayEvent {
            id,
            change: status_change(kind, &event.data.object),
            event_type: event.event_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    const SECRET: &str = "whsec_unit";

    fn decode(body: &Value) -> Result<GatewayEvent, WebhookError> {
        let payload = body.to_string();
        let header =
            signature::signature_header(payload.as_bytes(), SECRET, chrono::Utc::now().timestamp());
        StripeWebhookDecoder::new(SECRET, 300).decode(payload.as_bytes(), Some(&header))
    }

    #[test]
    fn payment_intent_succeeded_carries_receipt() {
        let event = decode(&json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {
                "id": "pi_1",
                "customer": "cus_9",
                "latest_charge": {"id": "ch_1", "receipt_url": "https://pay.example/r/1"}
            }}
        }))
        .unwrap();

        let change = event.change.unwrap();
        assert_eq!(change.reference.as_str(), "pi_1");
        assert_eq!(change.update.status, PaymentStatus::Succeeded);
        assert_eq!(change.update.receipt_url.as_deref(), Some("https://pay.example/r/1"));
        assert_eq!(change.update.customer_id.as_deref(), Some("cus_9"));
    }

    #[test]
    fn charge_refunded_uses_payment_intent_reference() {
        let event = decode(&json!({
            "id": "evt_2",
            "type": "charge.refunded",
            "data": {"object": {"id": "ch_1", "payment_intent": "pi_1"}}
        }))
        .unwrap();

        let change = event.change.unwrap();
        assert_eq!(change.reference.as_str(), "pi_1");
        assert_eq!(change.update.status, PaymentStatus::Refunded);
    }

    #[test]
    fn unknown_types_decode_without_change() {
        let event = decode(&json!({
            "id": "evt_3",
            "type": "customer.created",
            "data": {"object": {"id": "cus_1"}}
        }))
        .unwrap();
        assert_eq!(event.event_type, "customer.created");
        assert!(event.change.is_none());
    }

    #[test]
    fn known_type_without_reference_is_skipped() {
        let event = decode(&json!({
            "id": "evt_4",
            "type": "charge.refunded",
            "data": {"object": {"id": "ch_1"}}
        }))
        .unwrap();
        assert!(event.change.is_none());
    }

    #[test]
    fn missing_signature_is_rejected() {
        let err = StripeWebhookDecoder::new(SECRET, 300)
            .decode(b"{}", None)
            .unwrap_err();
        assert!(matches!(err, WebhookError::Signature(_)));
    }

    #[test]
    fn signed_garbage_is_a_payload_error() {
        let header = signature::signature_header(b"not json", SECRET, chrono::Utc::now().timestamp());
        let err = StripeWebhookDecoder::new(SECRET, 300)
            .decode(b"not json", Some(&header))
            .unwrap_err();
        assert!(matches!(err, WebhookError::Payload(_)));
    }
}
