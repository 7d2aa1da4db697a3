use {
    payflow::{
        AppState,
        adapters::{
            http,
            stripe::{client::StripeGateway, webhook::StripeWebhookDecoder},
        },
        config::AppConfig,
        domain::ports::{AuditLog, EventPublisher, PaymentStore, SearchIndex},
        infra::{
            memory::{
                BroadcastPublisher, InMemoryAuditLog, InMemoryPaymentCache, InMemoryPaymentStore,
                InMemorySearchIndex,
            },
            metrics::PaymentMetrics,
            postgres::{audit_repo::PgAuditLog, payment_repo::PgPaymentStore},
        },
        services::{
            gateway_client::GatewayClient, payment_lifecycle::PaymentLifecycleService,
            side_effects::SideEffectCoordinator, webhook_reconciler::WebhookReconciler,
        },
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::signal,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().expect("invalid configuration");

    let (store, audit): (Arc<dyn PaymentStore>, Arc<dyn AuditLog>) = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(20)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
                .expect("failed to connect to database");
            sqlx::migrate!()
                .run(&pool)
                .await
                .expect("failed to run migrations");
            (
                Arc::new(PgPaymentStore::new(pool.clone())),
                Arc::new(PgAuditLog::new(pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, payments are kept in memory");
            (
                Arc::new(InMemoryPaymentStore::new()),
                Arc::new(InMemoryAuditLog::new()),
            )
        }
    };

    let metrics = PaymentMetrics::new().expect("failed to register metrics");
    let cache = Arc::new(InMemoryPaymentCache::new());
    let search: Arc<dyn SearchIndex> = Arc::new(InMemorySearchIndex::new());
    let bus = BroadcastPublisher::default();
    spawn_event_logger(&bus);
    let publisher: Arc<dyn EventPublisher> = Arc::new(bus);

    let side_effects = Arc::new(SideEffectCoordinator::new(
        cache.clone(),
        audit.clone(),
        search.clone(),
        publisher,
        metrics.clone(),
    ));

    let gateway = GatewayClient::new(
        Arc::new(StripeGateway::new(&config.stripe_secret_key)),
        config.charge_limits(),
    )
    .with_policies(config.charge_policy(), config.confirm_policy());

    let payments = PaymentLifecycleService::new(
        gateway,
        store.clone(),
        cache,
        side_effects.clone(),
        metrics.clone(),
    );
    let webhooks = WebhookReconciler::new(
        Arc::new(StripeWebhookDecoder::new(
            config.stripe_webhook_secret.clone(),
            config.webhook_tolerance_secs,
        )),
        store,
        side_effects,
        metrics.clone(),
    );

    let state = AppState {
        payments: Arc::new(payments),
        webhooks: Arc::new(webhooks),
        audit,
        search,
        metrics,
    };
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.unwrap();
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

/// Lifecycle events have no downstream consumer in this process; log them.
fn spawn_event_logger(bus: &BroadcastPublisher) {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(%event, "lifecycle event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
