use {
    super::{
        gateway_client::{GatewayChargeResult, GatewayClient},
        side_effects::SideEffectCoordinator,
        status_sync::{self, SyncOutcome},
    },
    crate::{
        domain::{
            audit::CommitContext,
            charge::{ChargeRequest, is_plausible_email},
            error::{PaymentError, StoreError, ValidationError},
            event::LifecycleEventType,
            id::ExternalReference,
            payment::{NewPayment, NewPaymentParams, PaymentRecord, PaymentResult, StatusUpdate},
            ports::{PaymentCache, PaymentStore},
            search::PageRequest,
        },
        infra::metrics::PaymentMetrics,
    },
    std::sync::Arc,
};

/// Synchronous charge path plus the read side of payments.
pub struct PaymentLifecycleService {
    gateway: GatewayClient,
    store: Arc<dyn PaymentStore>,
    cache: Arc<dyn PaymentCache>,
    side_effects: Arc<SideEffectCoordinator>,
    metrics: PaymentMetrics,
    max_update_attempts: u32,
}

impl PaymentLifecycleService {
    pub fn new(
        gateway: GatewayClient,
        store: Arc<dyn PaymentStore>,
        cache: Arc<dyn PaymentCache>,
        side_effects: Arc<SideEffectCoordinator>,
        metrics: PaymentMetrics,
    ) -> Self {
        Self {
            gateway,
            store,
            cache,
            side_effects,
            metrics,
            max_update_attempts: status_sync::DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[tracing::instrument(
        name = "process_payment",
        skip_all,
        fields(user_id = %request.user_id, reference = tracing::field::Empty)
    )]
    pub async fn process_payment(
        &self,
        request: ChargeRequest,
        context: &CommitContext,
    ) -> Result<PaymentResult, PaymentError> {
        let result = self.create_and_persist(&request, context).await;
        match &result {
            Ok(payment) => {
                self.metrics.payment_processed();
                tracing::info!(status = %payment.status, "payment processed");
            }
            Err(err) => {
                self.metrics.payment_failed(err.code());
                tracing::warn!(code = err.code(), error = %err, "payment failed");
            }
        }
        result
    }

    async fn create_and_persist(
        &self,
        request: &ChargeRequest,
        context: &CommitContext,
    ) -> Result<PaymentResult, PaymentError> {
        let charge = self.gateway.validate(request)?;
        if !is_plausible_email(&charge.email) {
            return Err(ValidationError::InvalidEmail.into());
        }

        let gateway_result = self.gateway.submit_charge(&charge).await?;
        tracing::Span::current().record(
            "reference",
            tracing::field::display(&gateway_result.reference),
        );

        let new = NewPayment::new(NewPaymentParams {
            external_reference: gateway_result.reference.clone(),
            user_id: charge.user_id.clone(),
            plan_id: charge.plan_id.clone(),
            money: gateway_result.money.clone(),
            status: gateway_result.status,
            receipt_url: gateway_result.receipt_url.clone(),
            customer_id: gateway_result.customer_id.clone(),
            description: gateway_result
                .description
                .clone()
                .or_else(|| Some(charge.description())),
        });

        let record = match self.store.create(new).await {
            Ok(record) => {
                self.side_effects
                    .after_commit(&record, LifecycleEventType::Created, None, context)
                    .await;
                record
            }
            Err(StoreError::DuplicateReference(_)) => {
                tracing::info!("gateway replayed an existing charge, returning stored record");
                self.store
                    .find_by_reference(&gateway_result.reference)
                    .await?
                    .ok_or_else(|| PaymentError::NotFound(gateway_result.reference.to_string()))?
            }
            Err(err) => return Err(err.into()),
        };

        Ok(respond(&record, gateway_result))
    }

    /// Asks the gateway to confirm a stored charge and applies whatever status
    /// it reports through the guarded update.
    #[tracing::instrument(name = "confirm_payment", skip_all, fields(reference = %reference))]
    pub async fn confirm_payment(
        &self,
        reference: &ExternalReference,
        context: &CommitContext,
    ) -> Result<PaymentResult, PaymentError> {
        if self.store.find_by_reference(reference).await?.is_none() {
            return Err(PaymentError::NotFound(reference.to_string()));
        }

        let gateway_result = self.gateway.confirm_charge(reference).await?;
        let update = StatusUpdate::to(gateway_result.status)
            .with_receipt_url(gateway_result.receipt_url.clone())
            .with_customer_id(gateway_result.customer_id.clone());

        let outcome = status_sync::apply_status(
            self.store.as_ref(),
            reference,
            &update,
            self.max_update_attempts,
        )
        .await
        .map_err(|err| match err {
            StoreError::Conflict { reference, .. } => PaymentError::Contended(reference),
            other => other.into(),
        })?;

        let record = match outcome {
            SyncOutcome::Applied { previous, current } => {
                self.side_effects
                    .after_commit(
                        &current,
                        LifecycleEventType::Updated,
                        Some(&previous),
                        context,
                    )
                    .await;
                current
            }
            SyncOutcome::Unchanged(record) | SyncOutcome::Rejected { record, .. } => record,
            SyncOutcome::Missing => return Err(PaymentError::NotFound(reference.to_string())),
        };

        Ok(respond(&record, gateway_result))
    }

    /// Cache first; a miss is filled from the store. The cache drops the fill
    /// if a newer commit invalidated the entry while the store was read.
    pub async fn get_payment(
        &self,
        reference: &ExternalReference,
    ) -> Result<PaymentRecord, PaymentError> {
        match self.cache.get(reference).await {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(err) => tracing::warn!(reference = %reference, error = %err, "cache read failed"),
        }

        let record = self
            .store
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| PaymentError::NotFound(reference.to_string()))?;

        if let Err(err) = self.cache.put(&record).await {
            tracing::warn!(reference = %reference, error = %err, "cache fill failed");
        }
        Ok(record)
    }

    pub async fn payments_for_user(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Vec<PaymentRecord>, PaymentError> {
        Ok(self.store.find_by_user(user_id, page).await?)
    }
}

/// Status and `requires_action` always describe the stored record; the gateway
/// only contributes what the store does not keep.
fn respond(record: &PaymentRecord, gateway_result: GatewayChargeResult) -> PaymentResult {
    PaymentResult {
        client_secret: gateway_result.client_secret,
        metadata: (!gateway_result.metadata.is_empty()).then_some(gateway_result.metadata),
        ..PaymentResult::from_record(record)
    }
}
