use {
    super::payment::{PaymentRecord, PaymentStatus},
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEventType {
    #[serde(rename = "PAYMENT_CREATED")]
    Created,
    #[serde(rename = "PAYMENT_UPDATED")]
    Updated,
}

impl LifecycleEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "PAYMENT_CREATED",
            Self::Updated => "PAYMENT_UPDATED",
        }
    }
}

impl fmt::Display for LifecycleEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for LifecycleEventType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "PAYMENT_CREATED" => Ok(Self::Created),
            "PAYMENT_UPDATED" => Ok(Self::Updated),
            other => Err(format!("unknown lifecycle event type: {other}")),
        }
    }
}

/// Message published on the bus after every committed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub event_type: LifecycleEventType,
    pub external_reference: String,
    pub user_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub previous_status: Option<PaymentStatus>,
    pub occurred_at: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(
        record: &PaymentRecord,
        event_type: LifecycleEventType,
        previous: Option<&PaymentRecord>,
    ) -> Self {
        Self {
            event_type,
            external_reference: record.external_reference().to_string(),
            user_id: record.user_id().to_string(),
            amount: record.money().amount(),
            currency: record.money().currency().to_string(),
            status: record.status(),
            previous_status: previous.map(PaymentRecord::status),
            occurred_at: record.updated_at(),
        }
    }
}
