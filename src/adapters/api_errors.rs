use {
    crate::domain::error::{PaymentError, SinkError, ValidationError, WebhookError},
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

/// Domain errors as the HTTP layer sees them. Rendering lives here so the
/// domain never depends on axum.
#[derive(Debug)]
pub enum ApiError {
    Payment(PaymentError),
    Webhook(WebhookError),
    Sink(SinkError),
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self::Payment(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Payment(PaymentError::Validation(err))
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl From<SinkError> for ApiError {
    fn from(err: SinkError) -> Self {
        Self::Sink(err)
    }
}

const INTERNAL: (u16, &str) = (500, "internal_error");

impl ApiError {
    fn parts(&self) -> (u16, &'static str, String) {
        match self {
            Self::Payment(err) => {
                let status = err.http_status();
                if status >= 500 && err.code() == INTERNAL.1 {
                    tracing::error!(error = %err, "payment request failed");
                    return (INTERNAL.0, INTERNAL.1, "internal error".into());
                }
                let message = match err {
                    PaymentError::Validation(e) => e.to_string(),
                    PaymentError::Gateway(e) => e.message.clone(),
                    PaymentError::GatewayUnavailable { last, .. } => {
                        format!("payment gateway unavailable: {}", last.message)
                    }
                    other => other.to_string(),
                };
                (status, err.code(), message)
            }
            Self::Webhook(err @ (WebhookError::Signature(_) | WebhookError::Payload(_))) => {
                (err.http_status(), "webhook_error", err.to_string())
            }
            Self::Webhook(err) => {
                tracing::error!(error = %err, "webhook processing failed");
                (err.http_status(), INTERNAL.1, "internal error".into())
            }
            Self::Sink(err) => {
                tracing::error!(error = %err, "read model unavailable");
                (INTERNAL.0, INTERNAL.1, "internal error".into())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = serde_json::json!({
            "code": code,
            "httpStatus": status,
            "message": message,
        });

        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}
