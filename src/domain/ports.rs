use {
    super::audit::{AuditEntry, AuditQuery},
    super::error::{SinkError, StoreError},
    super::event::LifecycleEvent,
    super::id::ExternalReference,
    super::payment::{NewPayment, PaymentRecord, PaymentStatus, StatusUpdate, UpdateOutcome},
    super::search::{PageRequest, SearchPage, SearchProjection, SearchQuery},
    async_trait::async_trait,
    std::collections::HashMap,
};

/// Durable home of payment records.
///
/// `conditional_update_status` is the only mutation after creation. It
/// succeeds only if the stored version equals `expected_version`, checks the
/// transition against the status graph, and bumps the version by one.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateReference`] if the reference exists.
    async fn create(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError>;

    async fn find_by_reference(
        &self,
        reference: &ExternalReference,
    ) -> Result<Option<PaymentRecord>, StoreError>;

    /// Newest first.
    async fn find_by_user(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Vec<PaymentRecord>, StoreError>;

    async fn conditional_update_status(
        &self,
        reference: &ExternalReference,
        expected_version: i64,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, StoreError>;
}

/// Read-through cache of records keyed by external reference.
///
/// A read that raced a commit may try to fill the cache with the record it
/// saw before the write. `put` must drop any record older than what the cache
/// already holds or was last invalidated at.
#[async_trait]
pub trait PaymentCache: Send + Sync {
    async fn get(&self, reference: &ExternalReference) -> Result<Option<PaymentRecord>, SinkError>;
    async fn put(&self, record: &PaymentRecord) -> Result<(), SinkError>;
    /// Evicts the entry after `committed_version` was written.
    async fn invalidate(
        &self,
        reference: &ExternalReference,
        committed_version: i64,
    ) -> Result<(), SinkError>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), SinkError>;
    /// Oldest first.
    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, SinkError>;
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Replaces the stored document only when `doc.version` is newer.
    async fn upsert(&self, doc: SearchProjection) -> Result<(), SinkError>;
    async fn search(&self, query: &SearchQuery, page: PageRequest)
    -> Result<SearchPage, SinkError>;
    async fn status_counts(&self) -> Result<HashMap<PaymentStatus, u64>, SinkError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), SinkError>;
}
