//! # Pricing Error Types Module
//!
//! This module defines the error kinds returned by the pricing entry points.
//! Callers match on them to tell user input problems apart from missing
//! reference data and storage outages.

/// Errors surfaced by the pricing service
#[derive(Debug, Clone, PartialEq)]
pub enum PricingError {
    /// The postal code is well-formed but maps to no region
    UnknownPostalCode(String),
    /// The postal code is not five digits
    InvalidPostalCode(String),
    /// No dish with this identifier
    DishNotFound(String),
    /// A recipe line references an ingredient that does not exist
    IngredientNotFound(String),
    /// Reference data could not be read
    Unavailable(String),
}

impl PricingError {
    /// Errors the user can fix by changing their input
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            PricingError::UnknownPostalCode(_) | PricingError::InvalidPostalCode(_)
        )
    }

    /// Errors caused by missing reference data
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PricingError::DishNotFound(_) | PricingError::IngredientNotFound(_)
        )
    }

    /// Errors worth retrying later
    pub fn is_transient(&self) -> bool {
        matches!(self, PricingError::Unavailable(_))
    }
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::UnknownPostalCode(plz) => write!(f, "Unknown postal code: {plz}"),
            PricingError::InvalidPostalCode(plz) => {
                write!(f, "Invalid postal code: {plz:?} (expected 5 digits)")
            }
            PricingError::DishNotFound(id) => write!(f, "Dish not found: {id}"),
            PricingError::IngredientNotFound(id) => write!(f, "Ingredient not found: {id}"),
            PricingError::Unavailable(msg) => {
                write!(f, "Pricing data temporarily unavailable: {msg}")
            }
        }
    }
}

impl std::error::Error for PricingError {}

impl From<anyhow::Error> for PricingError {
    fn from(err: anyhow::Error) -> Self {
        PricingError::Unavailable(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_classification() {
        assert!(PricingError::UnknownPostalCode("99999".into()).is_user_correctable());
        assert!(PricingError::InvalidPostalCode("12a".into()).is_user_correctable());
        assert!(PricingError::DishNotFound("D404".into()).is_not_found());
        assert!(!PricingError::DishNotFound("D404".into()).is_transient());
        assert!(PricingError::Unavailable("timeout".into()).is_transient());
        assert!(!PricingError::Unavailable("timeout".into()).is_user_correctable());
    }

    #[test]
    fn test_storage_errors_become_unavailable() {
        let io: Result<(), std::io::Error> = Err(std::io::Error::other("connection reset"));
        let err: PricingError = io.context("Failed to fetch offers").unwrap_err().into();

        match err {
            PricingError::Unavailable(msg) => {
                assert!(msg.contains("Failed to fetch offers"));
                assert!(msg.contains("connection reset"));
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            PricingError::UnknownPostalCode("99999".into()).to_string(),
            "Unknown postal code: 99999"
        );
    }
}
