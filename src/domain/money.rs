use {
    super::error::ValidationError,
    rust_decimal::{Decimal, prelude::ToPrimitive},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Currencies without a fractional subunit: the gateway's integer amount is
/// the decimal amount itself.
const ZERO_DECIMAL: [&str; 16] = [
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// Upper-case ISO 4217 code. Only the shape is checked here; whether the
/// currency is accepted is decided by [`ChargeLimits`](super::charge::ChargeLimits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(ValidationError::MissingCurrency);
        }
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::UnsupportedCurrency {
                currency: code.to_string(),
                supported: String::new(),
            });
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zero_decimal(&self) -> bool {
        ZERO_DECIMAL.contains(&self.0.as_str())
    }

    /// Decimal amount → gateway integer amount. Fails when the amount has more
    /// precision than the currency's subunit or does not fit an `i64`.
    pub fn to_minor_units(&self, amount: Decimal) -> Result<i64, ValidationError> {
        let scaled = if self.is_zero_decimal() {
            Some(amount)
        } else {
            amount.checked_mul(Decimal::ONE_HUNDRED)
        };

        scaled
            .filter(|v| v.fract().is_zero())
            .and_then(|v| v.to_i64())
            .ok_or_else(|| ValidationError::AmountNotRepresentable {
                amount,
                currency: self.0.clone(),
            })
    }

    /// Gateway integer amount → decimal amount.
    pub fn from_minor_units(&self, minor: i64) -> Decimal {
        if self.is_zero_decimal() {
            Decimal::from(minor)
        } else {
            Decimal::new(minor, 2)
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Currency {
    type Error = ValidationError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Rebuilds an amount reported by the gateway in minor units.
    pub fn from_minor_units(minor: i64, currency: Currency) -> Self {
        Self {
            amount: currency.from_minor_units(minor),
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn minor_units(&self) -> Result<i64, ValidationError> {
        self.currency.to_minor_units(self.amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
