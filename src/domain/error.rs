use {
    super::guard::IllegalTransition,
    derive_more::Display,
    rust_decimal::Decimal,
    thiserror::Error,
};

/// Client input rejected before any gateway call. Every variant carries a
/// stable code a client can branch on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid payment amount")]
    InvalidAmount,

    #[error("payment amount exceeds maximum allowed ({max})")]
    AmountTooLarge { max: Decimal },

    #[error("amount {amount} cannot be expressed in the smallest unit of {currency}")]
    AmountNotRepresentable { amount: Decimal, currency: String },

    #[error("currency is required")]
    MissingCurrency,

    #[error("currency {currency} is not supported. Supported currencies: {supported}")]
    UnsupportedCurrency { currency: String, supported: String },

    #[error("payment method reference is required")]
    MissingPaymentMethod,

    #[error("user id is required")]
    MissingUserId,

    #[error("plan id is required")]
    MissingPlanId,

    #[error("a valid email is required")]
    InvalidEmail,

    #[error("invalid external reference: {0:?}")]
    InvalidReference(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "invalid_amount",
            Self::AmountTooLarge { .. } | Self::AmountNotRepresentable { .. } => "amount_too_large",
            Self::MissingCurrency => "missing_currency",
            Self::UnsupportedCurrency { .. } => "unsupported_currency",
            Self::MissingPaymentMethod => "missing_payment_method",
            Self::MissingUserId => "missing_user_id",
            Self::MissingPlanId => "missing_plan_id",
            Self::InvalidEmail => "invalid_email",
            Self::InvalidReference(_) => "invalid_payment_intent",
        }
    }
}

/// Gateway failure classes. Transient kinds are retried by the gateway client,
/// terminal kinds are returned as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GatewayErrorKind {
    #[display("card declined")]
    Card,
    #[display("rate limited")]
    RateLimit,
    #[display("invalid request")]
    InvalidRequest,
    #[display("authentication failed")]
    Authentication,
    #[display("connection failed")]
    Connection,
    #[display("timed out")]
    Timeout,
    #[display("gateway error")]
    Api,
}

impl GatewayErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Card => "card_error",
            Self::RateLimit => "rate_limit_error",
            Self::InvalidRequest => "invalid_request_error",
            Self::Authentication => "authentication_error",
            Self::Connection | Self::Timeout | Self::Api => "gateway_error",
        }
    }

    /// HTTP status a client should see for this failure.
    pub fn suggested_status(&self) -> u16 {
        match self {
            Self::Card | Self::InvalidRequest => 400,
            Self::RateLimit => 429,
            Self::Authentication => 500,
            Self::Connection | Self::Timeout | Self::Api => 502,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Authentication | Self::Connection | Self::Timeout | Self::Api
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn suggested_status(&self) -> u16 {
        self.kind.suggested_status()
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("gateway rejected the request: {0}")]
    Terminal(GatewayError),

    #[error("gateway unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: GatewayError },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("payment with external reference {0} already exists")]
    DuplicateReference(String),

    #[error("payment {0} not found")]
    NotFound(String),

    #[error("version conflict on {reference}: expected {expected}, found {actual}")]
    Conflict {
        reference: String,
        expected: i64,
        actual: i64,
    },

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt payment row: {0}")]
    Corrupt(String),
}

/// Failure of a best-effort sink (cache, audit, search, bus).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Errors that reach the caller of the synchronous payment API.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("gateway: {0}")]
    Gateway(GatewayError),

    #[error("gateway unavailable after {attempts} attempts: {last}")]
    GatewayUnavailable { attempts: u32, last: GatewayError },

    #[error("payment {0} not found")]
    NotFound(String),

    #[error("concurrent updates on {0} did not settle")]
    Contended(String),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("sink: {0}")]
    Sink(#[from] SinkError),
}

impl From<GatewayClientError> for PaymentError {
    fn from(err: GatewayClientError) -> Self {
        match err {
            GatewayClientError::Validation(e) => Self::Validation(e),
            GatewayClientError::Terminal(e) => Self::Gateway(e),
            GatewayClientError::Exhausted { attempts, last } => {
                Self::GatewayUnavailable { attempts, last }
            }
        }
    }
}

impl PaymentError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::Gateway(e) => e.code(),
            Self::GatewayUnavailable { last, .. } if last.kind == GatewayErrorKind::RateLimit => {
                "rate_limit_error"
            }
            Self::GatewayUnavailable { .. } => "gateway_unavailable",
            Self::NotFound(_) => "not_found",
            Self::Contended(_) | Self::Store(_) | Self::Sink(_) => "internal_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Gateway(e) => e.suggested_status(),
            Self::GatewayUnavailable { last, .. } if last.kind == GatewayErrorKind::RateLimit => 429,
            Self::GatewayUnavailable { .. } => 502,
            Self::NotFound(_) => 404,
            Self::Contended(_) | Self::Store(_) | Self::Sink(_) => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook signature: {0}")]
    Signature(String),

    #[error("malformed webhook payload: {0}")]
    Payload(String),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("concurrent updates on {0} did not settle")]
    Contended(String),
}

impl WebhookError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Signature(_) | Self::Payload(_) => 400,
            Self::Store(_) | Self::Contended(_) => 500,
        }
    }
}
