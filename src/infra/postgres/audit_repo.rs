use {
    crate::domain::{
        audit::{AuditEntry, AuditQuery},
        error::SinkError,
        event::LifecycleEventType,
        payment::PaymentStatus,
        ports::AuditLog,
    },
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::{PgPool, Postgres, QueryBuilder},
    uuid::Uuid,
};

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    external_reference: String,
    event_type: String,
    previous_status: Option<String>,
    new_status: String,
    actor: String,
    source_ip: Option<String>,
    message: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

fn status(s: &str) -> Result<PaymentStatus, SinkError> {
    PaymentStatus::try_from(s).map_err(|e| SinkError::Corrupt(e.to_string()))
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = SinkError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: row.id,
            event_type: LifecycleEventType::try_from(row.event_type.as_str())
                .map_err(SinkError::Corrupt)?,
            previous_status: row.previous_status.as_deref().map(status).transpose()?,
            new_status: status(&row.new_status)?,
            external_reference: row.external_reference,
            actor: row.actor,
            source_ip: row.source_ip,
            message: row.message,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), SinkError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, external_reference, event_type, previous_status, new_status,
                 actor, source_ip, message, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.external_reference)
        .bind(entry.event_type.as_str())
        .bind(entry.previous_status.map(|s| s.as_str()))
        .bind(entry.new_status.as_str())
        .bind(&entry.actor)
        .bind(entry.source_ip.as_deref())
        .bind(&entry.message)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, SinkError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, external_reference, event_type, previous_status, new_status, \
             actor, source_ip, message, metadata, created_at FROM audit_log WHERE TRUE",
        );
        if let Some(reference) = &query.reference {
            qb.push(" AND external_reference = ").push_bind(reference.clone());
        }
        if let Some(actor) = &query.actor {
            qb.push(" AND actor = ").push_bind(actor.clone());
        }
        if let Some(from) = query.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at, id");

        qb.build_query_as::<AuditRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AuditEntry::try_from)
            .collect()
    }
}
