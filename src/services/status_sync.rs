use crate::domain::{
    error::StoreError,
    guard::IllegalTransition,
    id::ExternalReference,
    payment::{PaymentRecord, StatusUpdate, UpdateOutcome},
    ports::PaymentStore,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Applied {
        previous: PaymentRecord,
        current: PaymentRecord,
    },
    Unchanged(PaymentRecord),
    /// Stale or duplicate event; the record was left as it is.
    Rejected {
        record: PaymentRecord,
        rejection: IllegalTransition,
    },
    Missing,
}

/// Re-read, then conditionally write, until the write lands or is refused.
/// Version conflicts are retried up to `max_attempts` times; the last
/// [`StoreError::Conflict`] is returned once they run out.
pub async fn apply_status(
    store: &dyn PaymentStore,
    reference: &ExternalReference,
    update: &StatusUpdate,
    max_attempts: u32,
) -> Result<SyncOutcome, StoreError> {
    let mut attempt = 0;

    loop {
        attempt += 1;
        let Some(current) = store.find_by_reference(reference).await? else {
            return Ok(SyncOutcome::Missing);
        };

        match store
            .conditional_update_status(reference, current.version(), update.clone())
            .await
        {
            Ok(UpdateOutcome::Applied { previous, current }) => {
                return Ok(SyncOutcome::Applied { previous, current });
            }
            Ok(UpdateOutcome::Unchanged(record)) => return Ok(SyncOutcome::Unchanged(record)),
            Err(StoreError::IllegalTransition(rejection)) => {
                tracing::warn!(
                    reference = %reference,
                    from = %rejection.from,
                    to = %rejection.to,
                    "illegal status transition dropped"
                );
                return Ok(SyncOutcome::Rejected {
                    record: current,
                    rejection,
                });
            }
            Err(StoreError::NotFound(_)) => return Ok(SyncOutcome::Missing),
            Err(err @ StoreError::Conflict { .. }) if attempt >= max_attempts => {
                tracing::error!(reference = %reference, attempts = attempt, "version conflicts did not settle");
                return Err(err);
            }
            Err(StoreError::Conflict { expected, actual, .. }) => {
                tracing::debug!(reference = %reference, attempt, expected, actual, "version conflict, re-reading");
            }
            Err(err) => return Err(err),
        }
    }
}
