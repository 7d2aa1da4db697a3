use {
    crate::domain::{
        audit::{AuditEntry, AuditQuery},
        error::{SinkError, StoreError},
        event::LifecycleEvent,
        guard::{StatusTransitionGuard, Transition},
        id::ExternalReference,
        payment::{NewPayment, PaymentRecord, PaymentStatus, StatusUpdate, UpdateOutcome},
        ports::{AuditLog, EventPublisher, PaymentCache, PaymentStore, SearchIndex},
        search::{PageRequest, SearchPage, SearchProjection, SearchQuery},
    },
    async_trait::async_trait,
    chrono::Utc,
    dashmap::{DashMap, mapref::entry::Entry},
    std::{collections::HashMap, sync::Arc},
    tokio::sync::{RwLock, broadcast},
};

/// Payment store behind a single `RwLock`. The version check, the guard and
/// the write all happen under one write guard, so a conditional update is
/// atomic.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<String, PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        let mut payments = self.payments.write().await;
        let key = payment.external_reference().to_string();
        if payments.contains_key(&key) {
            return Err(StoreError::DuplicateReference(key));
        }
        let record = PaymentRecord::create(payment, Utc::now());
        payments.insert(key, record.clone());
        Ok(record)
    }

    async fn find_by_reference(
        &self,
        reference: &ExternalReference,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        let payments = self.payments.read().await;
        Ok(payments.get(reference.as_str()).cloned())
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        let payments = self.payments.read().await;
        let mut owned: Vec<PaymentRecord> = payments
            .values()
            .filter(|p| p.user_id() == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(page.slice(&owned))
    }

    async fn conditional_update_status(
        &self,
        reference: &ExternalReference,
        expected_version: i64,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut payments = self.payments.write().await;
        let current = payments
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))?;

        if current.version() != expected_version {
            return Err(StoreError::Conflict {
                reference: reference.to_string(),
                expected: expected_version,
                actual: current.version(),
            });
        }

        match StatusTransitionGuard::check(current.status(), update.status)? {
            Transition::Unchanged => Ok(UpdateOutcome::Unchanged(current)),
            Transition::Advance => {
                let next = current.apply(&update, Utc::now());
                payments.insert(reference.to_string(), next.clone());
                Ok(UpdateOutcome::Applied {
                    previous: current,
                    current: next,
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
enum CacheSlot {
    Cached(PaymentRecord),
    /// Evicted after this version was committed; older fills are dropped.
    Evicted(i64),
}

impl CacheSlot {
    fn version(&self) -> i64 {
        match self {
            Self::Cached(record) => record.version(),
            Self::Evicted(version) => *version,
        }
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPaymentCache {
    entries: Arc<DashMap<String, CacheSlot>>,
}

impl InMemoryPaymentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.entries
            .get(reference)
            .is_some_and(|slot| matches!(slot.value(), CacheSlot::Cached(_)))
    }
}

#[async_trait]
impl PaymentCache for InMemoryPaymentCache {
    async fn get(&self, reference: &ExternalReference) -> Result<Option<PaymentRecord>, SinkError> {
        Ok(self
            .entries
            .get(reference.as_str())
            .and_then(|slot| match slot.value() {
                CacheSlot::Cached(record) => Some(record.clone()),
                CacheSlot::Evicted(_) => None,
            }))
    }

    async fn put(&self, record: &PaymentRecord) -> Result<(), SinkError> {
        match self.entries.entry(record.external_reference().to_string()) {
            Entry::Occupied(mut slot) => {
                if slot.get().version() <= record.version() {
                    slot.insert(CacheSlot::Cached(record.clone()));
                } else {
                    tracing::debug!(
                        reference = %record.external_reference(),
                        version = record.version(),
                        "dropping stale cache fill"
                    );
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(CacheSlot::Cached(record.clone()));
            }
        }
        Ok(())
    }

    async fn invalidate(
        &self,
        reference: &ExternalReference,
        committed_version: i64,
    ) -> Result<(), SinkError> {
        self.entries
            .entry(reference.to_string())
            .and_modify(|slot| {
                *slot = CacheSlot::Evicted(slot.version().max(committed_version));
            })
            .or_insert(CacheSlot::Evicted(committed_version));
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), SinkError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, SinkError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| query.matches(e)).cloned().collect())
    }
}

/// Projection keyed by external reference. An upsert only replaces an older
/// document, so fan-outs that finish out of order cannot move it backwards.
#[derive(Default, Clone)]
pub struct InMemorySearchIndex {
    docs: Arc<RwLock<HashMap<String, SearchProjection>>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert(&self, doc: SearchProjection) -> Result<(), SinkError> {
        let mut docs = self.docs.write().await;
        match docs.get(&doc.external_reference) {
            Some(existing) if existing.version >= doc.version => {
                tracing::debug!(
                    reference = %doc.external_reference,
                    stored = existing.version,
                    incoming = doc.version,
                    "ignoring out-of-order projection"
                );
            }
            _ => {
                docs.insert(doc.external_reference.clone(), doc);
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &SearchQuery,
        page: PageRequest,
    ) -> Result<SearchPage, SinkError> {
        let docs = self.docs.read().await;
        let mut hits: Vec<SearchProjection> =
            docs.values().filter(|d| query.matches(d)).cloned().collect();
        hits.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.external_reference.cmp(&a.external_reference))
        });

        Ok(SearchPage {
            total: hits.len() as u64,
            items: page.slice(&hits),
            page: page.page,
            size: page.limit(),
        })
    }

    async fn status_counts(&self) -> Result<HashMap<PaymentStatus, u64>, SinkError> {
        let docs = self.docs.read().await;
        let mut counts = HashMap::new();
        for doc in docs.values() {
            *counts.entry(doc.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

/// In-process bus. Events go out as JSON text; having no subscribers is not
/// an error.
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<String>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), SinkError> {
        let message = serde_json::to_string(&event)?;
        if self.sender.send(message).is_err() {
            tracing::trace!(reference = %event.external_reference, "no bus subscribers");
        }
        Ok(())
    }
}
