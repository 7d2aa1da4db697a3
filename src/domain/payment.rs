use {
    super::error::StoreError,
    super::id::ExternalReference,
    super::money::Money,
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::{collections::HashMap, fmt},
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 9] = [
        Self::RequiresPaymentMethod,
        Self::RequiresConfirmation,
        Self::RequiresAction,
        Self::Processing,
        Self::RequiresCapture,
        Self::Succeeded,
        Self::Canceled,
        Self::Failed,
        Self::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "REQUIRES_PAYMENT_METHOD",
            Self::RequiresConfirmation => "REQUIRES_CONFIRMATION",
            Self::RequiresAction => "REQUIRES_ACTION",
            Self::Processing => "PROCESSING",
            Self::RequiresCapture => "REQUIRES_CAPTURE",
            Self::Succeeded => "SUCCEEDED",
            Self::Canceled => "CANCELED",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Canceled | Self::Failed | Self::Refunded
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = StoreError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| StoreError::Corrupt(format!("unknown payment status: {s}")))
    }
}

/// Canonical payment record. Owned by the payment store; the only way to
/// change it is a conditional status update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRecord {
    id: Uuid,
    external_reference: ExternalReference,
    user_id: String,
    plan_id: String,
    money: Money,
    status: PaymentStatus,
    receipt_url: Option<String>,
    customer_id: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

/// Every column of a stored payment, used by store implementations to
/// rebuild a record.
#[derive(Debug, Clone)]
pub struct StoredPayment {
    pub id: Uuid,
    pub external_reference: ExternalReference,
    pub user_id: String,
    pub plan_id: String,
    pub money: Money,
    pub status: PaymentStatus,
    pub receipt_url: Option<String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl PaymentRecord {
    pub fn restore(stored: StoredPayment) -> Self {
        Self {
            id: stored.id,
            external_reference: stored.external_reference,
            user_id: stored.user_id,
            plan_id: stored.plan_id,
            money: stored.money,
            status: stored.status,
            receipt_url: stored.receipt_url,
            customer_id: stored.customer_id,
            description: stored.description,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            version: stored.version,
        }
    }

    /// First version of a freshly inserted payment.
    pub fn create(new: NewPayment, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            external_reference: new.external_reference,
            user_id: new.user_id,
            plan_id: new.plan_id,
            money: new.money,
            status: new.status,
            receipt_url: new.receipt_url,
            customer_id: new.customer_id,
            description: new.description,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Next version with `update` applied. Optional fields are last-writer-wins
    /// but an absent value never clears a present one.
    pub fn apply(&self, update: &StatusUpdate, now: DateTime<Utc>) -> Self {
        Self {
            status: update.status,
            receipt_url: update.receipt_url.clone().or_else(|| self.receipt_url.clone()),
            customer_id: update.customer_id.clone().or_else(|| self.customer_id.clone()),
            description: update.description.clone().or_else(|| self.description.clone()),
            updated_at: now,
            version: self.version + 1,
            ..self.clone()
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn external_reference(&self) -> &ExternalReference {
        &self.external_reference
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn money(&self) -> &Money {
        &self.money
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn receipt_url(&self) -> Option<&str> {
        self.receipt_url.as_deref()
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> i64 {
        self.version
    }
}

pub struct NewPaymentParams {
    pub external_reference: ExternalReference,
    pub user_id: String,
    pub plan_id: String,
    pub money: Money,
    pub status: PaymentStatus,
    pub receipt_url: Option<String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
}

/// For INSERT; id generated in Rust via Uuid::now_v7().
#[derive(Debug, Clone)]
pub struct NewPayment {
    id: Uuid,
    external_reference: ExternalReference,
    user_id: String,
    plan_id: String,
    money: Money,
    status: PaymentStatus,
    receipt_url: Option<String>,
    customer_id: Option<String>,
    description: Option<String>,
}

impl NewPayment {
    pub fn new(p: NewPaymentParams) -> Self {
        Self {
            id: Uuid::now_v7(),
            external_reference: p.external_reference,
            user_id: p.user_id,
            plan_id: p.plan_id,
            money: p.money,
            status: p.status,
            receipt_url: p.receipt_url,
            customer_id: p.customer_id,
            description: p.description,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn external_reference(&self) -> &ExternalReference {
        &self.external_reference
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn money(&self) -> &Money {
        &self.money
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn receipt_url(&self) -> Option<&str> {
        self.receipt_url.as_deref()
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Target status plus the refreshed optional fields that travel with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: PaymentStatus,
    pub receipt_url: Option<String>,
    pub customer_id: Option<String>,
    pub description: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: PaymentStatus) -> Self {
        Self {
            status,
            receipt_url: None,
            customer_id: None,
            description: None,
        }
    }

    pub fn with_receipt_url(mut self, receipt_url: Option<String>) -> Self {
        self.receipt_url = receipt_url;
        self
    }

    pub fn with_customer_id(mut self, customer_id: Option<String>) -> Self {
        self.customer_id = customer_id;
        self
    }
}

/// Result of a successful conditional update.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// Status moved; both versions are returned for audit diffing.
    Applied {
        previous: PaymentRecord,
        current: PaymentRecord,
    },
    /// Target equals the current status; nothing written.
    Unchanged(PaymentRecord),
}

/// Response body for charge creation and payment reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub requires_action: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentResult {
    pub fn from_record(record: &PaymentRecord) -> Self {
        Self {
            external_reference: record.external_reference().to_string(),
            client_secret: None,
            amount: record.money().amount(),
            currency: record.money().currency().to_string(),
            status: record.status(),
            requires_action: record.status() == PaymentStatus::RequiresAction,
            receipt_url: record.receipt_url().map(str::to_string),
            metadata: None,
            created_at: record.created_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Currency;

    fn record() -> PaymentRecord {
        let new = NewPayment::new(NewPaymentParams {
            external_reference: ExternalReference::new("pi_apply").unwrap(),
            user_id: "42".into(),
            plan_id: "premium".into(),
            money: Money::new(Decimal::new(1999, 2), Currency::new("USD").unwrap()),
            status: PaymentStatus::Processing,
            receipt_url: Some("https://pay.example/r/1".into()),
            customer_id: None,
            description: None,
        });
        PaymentRecord::create(new, Utc::now())
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in PaymentStatus::ALL {
            assert_eq!(PaymentStatus::try_from(status.as_str()).unwrap(), status);
        }
        assert!(PaymentStatus::try_from("pending").is_err());
    }

    #[test]
    fn apply_bumps_version_and_keeps_identity() {
        let before = record();
        let after = before.apply(&StatusUpdate::to(PaymentStatus::Succeeded), Utc::now());
        assert_eq!(after.version(), before.version() + 1);
        assert_eq!(after.id(), before.id());
        assert_eq!(after.created_at(), before.created_at());
        assert_eq!(after.money(), before.money());
        assert_eq!(after.status(), PaymentStatus::Succeeded);
    }

    #[test]
    fn apply_never_clears_optional_fields() {
        let before = record();
        let after = before.apply(
            &StatusUpdate::to(PaymentStatus::Succeeded).with_customer_id(Some("cus_1".into())),
            Utc::now(),
        );
        assert_eq!(after.receipt_url(), Some("https://pay.example/r/1"));
        assert_eq!(after.customer_id(), Some("cus_1"));
    }
}
