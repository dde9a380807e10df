//! Parsing error types for storefront HTML extraction
//!
//! Field-level problems are recoverable: the extractor logs them and keeps
//! the record with the field left empty.

use thiserror::Error;

use crate::domain::errors::CatalogError;

#[derive(Error, Debug, Clone)]
pub enum ParsingError {
    #[error("Required field '{field}' not found in HTML")]
    RequiredFieldMissing {
        field: String,
        context: Option<String>,
    },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed {
        url: String,
        reason: String,
        base_url: Option<String>,
    },

    #[error("Price field '{field}' could not be parsed: {reason}")]
    PriceFormat { field: String, reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String, field: String },
}

impl ParsingError {
    /// Create a required field missing error with context
    pub fn required_field_missing(field: &str, context: Option<&str>) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
            context: context.map(ToString::to_string),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn url_resolution_failed(url: &str, reason: impl ToString, base_url: Option<&str>) -> Self {
        Self::UrlResolutionFailed {
            url: url.to_string(),
            reason: reason.to_string(),
            base_url: base_url.map(ToString::to_string),
        }
    }

    /// Check if this error is recoverable
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::RequiredFieldMissing { .. }
            | Self::UrlResolutionFailed { .. }
            | Self::PriceFormat { .. } => true,
            Self::InvalidSelector { .. } | Self::ConfigurationError { .. } => false,
        }
    }
}

impl From<ParsingError> for CatalogError {
    fn from(err: ParsingError) -> Self {
        match err {
            ParsingError::InvalidSelector { .. } | ParsingError::ConfigurationError { .. } => {
                Self::Configuration(err.to_string())
            }
            ParsingError::RequiredFieldMissing { ref field, .. }
            | ParsingError::PriceFormat { ref field, .. } => Self::parse(field, err.to_string()),
            ParsingError::UrlResolutionFailed { .. } => Self::parse("url", err.to_string()),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
