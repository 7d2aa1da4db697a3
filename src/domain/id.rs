use {
    super::error::ValidationError,
    derive_more::Display,
    serde::{Deserialize, Serialize},
};

/// Gateway-assigned charge identifier (`pi_xxx` for Stripe). The join key
/// between a stored payment and every webhook about it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalReference(String);

impl ExternalReference {
    pub fn new(reference: impl Into<String>) -> Result<Self, ValidationError> {
        let reference = reference.into();
        if reference.trim().is_empty() || reference.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidReference(reference));
        }
        Ok(Self(reference))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Stripe event identifier (`evt_xxx`).
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if !id.starts_with("evt_") {
            return Err(ValidationError::InvalidReference(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_rejects_blank_and_whitespace() {
        assert!(ExternalReference::new("").is_err());
        assert!(ExternalReference::new("  ").is_err());
        assert!(ExternalReference::new("pi 123").is_err());
        assert_eq!(ExternalReference::new("pi_123").unwrap().as_str(), "pi_123");
    }

    #[test]
    fn event_id_requires_prefix() {
        assert!(EventId::new("evt_1").is_ok());
        assert!(EventId::new("pi_1").is_err());
    }
}
