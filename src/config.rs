use {
    crate::{
        domain::{charge::ChargeLimits, money::Currency},
        services::gateway_client::RetryPolicy,
    },
    rust_decimal::Decimal,
    std::{net::SocketAddr, str::FromStr, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` runs on the in-memory store and audit log.
    pub database_url: Option<String>,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub supported_currencies: Vec<Currency>,
    pub max_payment_amount: Decimal,
    pub webhook_tolerance_secs: i64,
    pub gateway_call_timeout: Duration,
    pub gateway_total_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let supported_currencies = get("SUPPORTED_CURRENCIES")
            .unwrap_or_else(|| "usd,eur,gbp,jpy".to_string())
            .split(',')
            .map(|code| {
                Currency::new(code).map_err(|e| ConfigError::Invalid {
                    name: "SUPPORTED_CURRENCIES",
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let max_payment_amount: Decimal =
            parse(&get, "MAX_PAYMENT_AMOUNT", Decimal::from(1_000_000))?;
        if max_payment_amount <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                name: "MAX_PAYMENT_AMOUNT",
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            bind_addr: parse(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            database_url: get("DATABASE_URL"),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            supported_currencies,
            max_payment_amount,
            webhook_tolerance_secs: parse(&get, "WEBHOOK_TOLERANCE_SECS", 300)?,
            gateway_call_timeout: positive_secs(&get, "GATEWAY_CALL_TIMEOUT_SECS", 10)?,
            gateway_total_timeout: positive_secs(&get, "GATEWAY_TOTAL_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn charge_limits(&self) -> ChargeLimits {
        ChargeLimits::new(self.max_payment_amount, self.supported_currencies.clone())
    }

    pub fn charge_policy(&self) -> RetryPolicy {
        RetryPolicy::charge().with_timeouts(self.gateway_call_timeout, self.gateway_total_timeout)
    }

    pub fn confirm_policy(&self) -> RetryPolicy {
        RetryPolicy::confirmation()
            .with_timeouts(self.gateway_call_timeout, self.gateway_total_timeout)
    }
}

fn parse<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// A zero deadline would fail every gateway call before it starts.
fn positive_secs(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match parse(get, name, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            reason: "must be at least one second".into(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}
