pub mod gateway_client;
pub mod payment_lifecycle;
pub mod side_effects;
pub mod status_sync;
pub mod webhook_reconciler;
