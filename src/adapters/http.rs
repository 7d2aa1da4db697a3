use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            audit::{Actor, AuditEntry, AuditQuery, CommitContext},
            charge::ChargeRequest,
            id::ExternalReference,
            payment::{PaymentResult, PaymentStatus},
            search::{PageRequest, SearchPage, SearchQuery},
        },
    },
    axum::{
        Json, Router,
        body::Bytes,
        extract::{DefaultBodyLimit, Path, Query, State},
        http::{HeaderMap, StatusCode, header},
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    rust_decimal::Decimal,
    serde::Deserialize,
    std::{collections::BTreeMap, time::Duration},
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

/// Outlives the gateway client's 30 s operation ceiling.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/api/payments", post(create_payment))
        .route("/api/payments/search", get(search_payments))
        .route("/api/payments/stats", get(payment_stats))
        .route("/api/payments/user/{user_id}", get(user_payments))
        .route("/api/payments/{reference}", get(get_payment))
        .route("/api/payments/{reference}/confirm", post(confirm_payment))
        .route("/api/audit", get(audit_entries))
        .route("/api/webhooks/stripe", post(stripe_webhook))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(64 * 1024)) // 64 KB, Stripe events are typically <20 KB
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// First hop of `X-Forwarded-For`, if the edge proxy set one.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChargeRequest>,
) -> Result<(StatusCode, Json<PaymentResult>), ApiError> {
    let context = CommitContext::new(
        Actor::User(request.user_id.trim().to_string()),
        client_ip(&headers),
    );
    let result = state.payments.process_payment(request, &context).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn get_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<PaymentResult>, ApiError> {
    let reference = ExternalReference::new(reference)?;
    let record = state.payments.get_payment(&reference).await?;
    Ok(Json(PaymentResult::from_record(&record)))
}

async fn confirm_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> Result<Json<PaymentResult>, ApiError> {
    let reference = ExternalReference::new(reference)?;
    let context = CommitContext::new(Actor::System, client_ip(&headers));
    let result = state.payments.confirm_payment(&reference, &context).await?;
    Ok(Json(result))
}

async fn user_payments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Vec<PaymentResult>>, ApiError> {
    let records = state.payments.payments_for_user(&user_id, page).await?;
    Ok(Json(records.iter().map(PaymentResult::from_record).collect()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SearchParams {
    text: Option<String>,
    min_amount: Option<Decimal>,
    max_amount: Option<Decimal>,
    status: Option<PaymentStatus>,
    user_id: Option<String>,
    page: Option<u32>,
    size: Option<u32>,
}

async fn search_payments(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, ApiError> {
    let defaults = PageRequest::default();
    let page = PageRequest::new(
        params.page.unwrap_or(defaults.page),
        params.size.unwrap_or(defaults.size),
    );
    let query = SearchQuery {
        text: params.text,
        min_amount: params.min_amount,
        max_amount: params.max_amount,
        status: params.status,
        user_id: params.user_id,
    };
    Ok(Json(state.search.search(&query, page).await?))
}

async fn payment_stats(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<&'static str, u64>>, ApiError> {
    let counts = state.search.status_counts().await?;
    let stats = PaymentStatus::ALL
        .into_iter()
        .map(|status| (status.as_str(), counts.get(&status).copied().unwrap_or(0)))
        .collect();
    Ok(Json(stats))
}

async fn audit_entries(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    Ok(Json(state.audit.query(&query).await?))
}

async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .webhooks
        .handle_event(&body, signature, client_ip(&headers).as_deref())
        .await?;

    Ok(Json(serde_json::json!({"status": outcome.as_str()})))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);
        headers.insert("X-Forwarded-For", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}
