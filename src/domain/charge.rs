use {
    super::error::ValidationError,
    super::money::{Currency, Money},
    rust_decimal::Decimal,
    serde::Deserialize,
};

/// Incoming charge request. Missing fields deserialize to empty values so
/// that validation, not the JSON extractor, produces the error code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChargeRequest {
    pub user_id: String,
    pub plan_id: String,
    pub payment_method_ref: String,
    pub email: String,
    pub amount: Decimal,
    pub currency: String,
    pub save_payment_method: bool,
}

/// A request that passed every check, with the amount already converted to
/// the gateway's integer representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCharge {
    pub user_id: String,
    pub plan_id: String,
    pub payment_method_ref: String,
    pub email: String,
    pub money: Money,
    pub minor_amount: i64,
    pub save_payment_method: bool,
}

impl ValidatedCharge {
    pub fn description(&self) -> String {
        format!("Payment for plan: {}", self.plan_id)
    }
}

/// Amount ceiling and accepted currencies.
#[derive(Debug, Clone)]
pub struct ChargeLimits {
    max_amount: Decimal,
    supported: Vec<Currency>,
}

impl ChargeLimits {
    pub fn new(max_amount: Decimal, supported: Vec<Currency>) -> Self {
        Self {
            max_amount,
            supported,
        }
    }

    pub fn max_amount(&self) -> Decimal {
        self.max_amount
    }

    pub fn supported_currencies(&self) -> &[Currency] {
        &self.supported
    }

    pub fn validate(&self, request: &ChargeRequest) -> Result<ValidatedCharge, ValidationError> {
        if request.amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount);
        }
        if request.amount > self.max_amount {
            return Err(ValidationError::AmountTooLarge {
                max: self.max_amount,
            });
        }

        let currency = Currency::new(&request.currency).map_err(|e| match e {
            ValidationError::UnsupportedCurrency { currency, .. } => self.unsupported(currency),
            other => other,
        })?;
        if !self.supported.contains(&currency) {
            return Err(self.unsupported(currency.to_string()));
        }

        let payment_method_ref = non_blank(&request.payment_method_ref)
            .ok_or(ValidationError::MissingPaymentMethod)?;
        let user_id = non_blank(&request.user_id).ok_or(ValidationError::MissingUserId)?;
        let plan_id = non_blank(&request.plan_id).ok_or(ValidationError::MissingPlanId)?;

        let minor_amount = currency.to_minor_units(request.amount)?;

        Ok(ValidatedCharge {
            user_id,
            plan_id,
            payment_method_ref,
            email: request.email.trim().to_string(),
            money: Money::new(request.amount, currency),
            minor_amount,
            save_payment_method: request.save_payment_method,
        })
    }

    fn unsupported(&self, currency: String) -> ValidationError {
        ValidationError::UnsupportedCurrency {
            currency,
            supported: self
                .supported
                .iter()
                .map(Currency::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Minimal shape check: something on both sides of a single `@`, and a dot in
/// the domain part.
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
