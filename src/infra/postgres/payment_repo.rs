use {
    crate::domain::{
        error::StoreError,
        guard::{StatusTransitionGuard, Transition},
        id::ExternalReference,
        money::{Currency, Money},
        payment::{
            NewPayment, PaymentRecord, PaymentStatus, StatusUpdate, StoredPayment, UpdateOutcome,
        },
        ports::PaymentStore,
        search::PageRequest,
    },
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    sqlx::PgPool,
    uuid::Uuid,
};

const COLUMNS: &str = "id, external_reference, user_id, plan_id, amount, currency, status, \
                       receipt_url, customer_id, description, created_at, updated_at, version";

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    external_reference: String,
    user_id: String,
    plan_id: String,
    amount: Decimal,
    currency: String,
    status: String,
    receipt_url: Option<String>,
    customer_id: Option<String>,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency = Currency::new(&row.currency)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", row.external_reference)))?;
        // NUMERIC(19,4) comes back with four places; restore the currency's scale.
        let scale = if currency.is_zero_decimal() { 0 } else { 2 };
        let amount = row.amount.round_dp(scale);

        Ok(PaymentRecord::restore(StoredPayment {
            id: row.id,
            external_reference: ExternalReference::new(row.external_reference)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            user_id: row.user_id,
            plan_id: row.plan_id,
            money: Money::new(amount, currency),
            status: PaymentStatus::try_from(row.status.as_str())?,
            receipt_url: row.receipt_url,
            customer_id: row.customer_id,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        }))
    }
}

#[derive(Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn create(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        let now = Utc::now();
        let result = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments
                (id, external_reference, user_id, plan_id, amount, currency, status,
                 receipt_url, customer_id, description, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, 1)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(payment.id())
        .bind(payment.external_reference().as_str())
        .bind(payment.user_id())
        .bind(payment.plan_id())
        .bind(payment.money().amount())
        .bind(payment.money().currency().as_str())
        .bind(payment.status().as_str())
        .bind(payment.receipt_url())
        .bind(payment.customer_id())
        .bind(payment.description())
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.try_into(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                StoreError::DuplicateReference(payment.external_reference().to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_reference(
        &self,
        reference: &ExternalReference,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {COLUMNS} FROM payments WHERE external_reference = $1"
        ))
        .bind(reference.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(PaymentRecord::try_from)
        .transpose()
    }

    async fn find_by_user(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM payments
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(i64::from(page.limit()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(PaymentRecord::try_from)
        .collect()
    }

    /// Row lock plus version predicate: the guard runs against the locked
    /// row and the UPDATE only lands on the version that was checked.
    async fn conditional_update_status(
        &self,
        reference: &ExternalReference,
        expected_version: i64,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: PaymentRecord = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {COLUMNS} FROM payments WHERE external_reference = $1 FOR UPDATE"
        ))
        .bind(reference.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(reference.to_string()))?
        .try_into()?;

        if current.version() != expected_version {
            return Err(StoreError::Conflict {
                reference: reference.to_string(),
                expected: expected_version,
                actual: current.version(),
            });
        }

        if StatusTransitionGuard::check(current.status(), update.status)? == Transition::Unchanged {
            tx.commit().await?;
            return Ok(UpdateOutcome::Unchanged(current));
        }

        let next = current.apply(&update, Utc::now());
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments
            SET status = $1, receipt_url = $2, customer_id = $3, description = $4,
                updated_at = $5, version = version + 1
            WHERE external_reference = $6 AND version = $7
            RETURNING {COLUMNS}
            "#
        ))
        .bind(next.status().as_str())
        .bind(next.receipt_url())
        .bind(next.customer_id())
        .bind(next.description())
        .bind(next.updated_at())
        .bind(reference.as_str())
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(StoreError::Conflict {
                reference: reference.to_string(),
                expected: expected_version,
                actual: expected_version + 1,
            });
        };

        tx.commit().await?;
        Ok(UpdateOutcome::Applied {
            previous: current,
            current: row.try_into()?,
        })
    }
}
