use {
    super::payment::{PaymentRecord, PaymentStatus},
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
};

/// Denormalized, eventually consistent copy of a payment for querying.
/// Never read back to make lifecycle decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchProjection {
    pub id: String,
    pub external_reference: String,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub user_id: String,
    pub plan_id: String,
    pub created_at: DateTime<Utc>,
    pub description: String,
    /// Record version this document was built from.
    pub version: i64,
}

impl From<&PaymentRecord> for SearchProjection {
    fn from(record: &PaymentRecord) -> Self {
        Self {
            id: record.id().to_string(),
            external_reference: record.external_reference().to_string(),
            status: record.status(),
            amount: record.money().amount(),
            currency: record.money().currency().to_string(),
            user_id: record.user_id().to_string(),
            plan_id: record.plan_id().to_string(),
            created_at: record.created_at(),
            description: record
                .description()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Payment for plan: {}", record.plan_id())),
            version: record.version(),
        }
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> u32 {
        self.size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.limit())
    }

    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.limit() as usize)
            .cloned()
            .collect()
    }
}

/// Free-text plus structured filters. Free text matches case-insensitively on
/// description, reference, user and plan.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub status: Option<PaymentStatus>,
    pub user_id: Option<String>,
}

impl SearchQuery {
    pub fn matches(&self, doc: &SearchProjection) -> bool {
        let text_ok = self.text.as_deref().map(str::trim).is_none_or(|t| {
            let needle = t.to_lowercase();
            needle.is_empty()
                || [
                    &doc.description,
                    &doc.external_reference,
                    &doc.user_id,
                    &doc.plan_id,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        });

        text_ok
            && self.min_amount.is_none_or(|min| doc.amount >= min)
            && self.max_amount.is_none_or(|max| doc.amount <= max)
            && self.status.is_none_or(|s| doc.status == s)
            && self.user_id.as_ref().is_none_or(|u| *u == doc.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub items: Vec<SearchProjection>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
}
