pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    domain::ports::{AuditLog, SearchIndex},
    infra::metrics::PaymentMetrics,
    services::{payment_lifecycle::PaymentLifecycleService, webhook_reconciler::WebhookReconciler},
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentLifecycleService>,
    pub webhooks: Arc<WebhookReconciler>,
    pub audit: Arc<dyn AuditLog>,
    pub search: Arc<dyn SearchIndex>,
    pub metrics: PaymentMetrics,
}
