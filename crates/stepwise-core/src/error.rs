//! Unified error types for stepwise

use thiserror::Error;

/// Unified error type for all stepwise operations
#[derive(Error, Debug)]
pub enum StepwiseError {
    // Pipeline errors
    #[error("Interpretation failed for step '{step}': {reason}")]
    Interpretation { step: String, reason: String },

    #[error("No selector strategy matched: {attempted}")]
    SelectorResolution { attempted: String },

    #[error("Navigation to {url} timed out: {detail}")]
    NavigationTimeout { url: String, detail: String },

    #[error("Expected text not found on page: '{0}'")]
    TextNotFound(String),

    #[error("Browser session lost: {0}")]
    SessionFatal(String),

    // Browser errors that are neither fatal nor resolution failures
    #[error("Browser error: {0}")]
    Browser(String),

    // Language-model API errors
    #[error("API error: {0}")]
    Api(String),

    #[error("API limit reached: {0}")]
    ApiLimit(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl StepwiseError {
    /// Only a lost browser session aborts a scenario; everything else is a step failure
    pub fn is_fatal(&self) -> bool {
        matches!(self, StepwiseError::SessionFatal(_))
    }

    /// True for timeouts the navigation policy may retry with another wait strategy
    pub fn is_timeout(&self) -> bool {
        matches!(self, StepwiseError::NavigationTimeout { .. })
    }
}

/// Result type alias using StepwiseError
pub type Result<T> = std::result::Result<T, StepwiseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_loss_is_fatal() {
        assert!(StepwiseError::SessionFatal("tab crashed".into()).is_fatal());
        assert!(!StepwiseError::SelectorResolution {
            attempted: "css:#login".into()
        }
        .is_fatal());
        assert!(!StepwiseError::NavigationTimeout {
            url: "https://example.com".into(),
            detail: "networkidle".into()
        }
        .is_fatal());
        assert!(!StepwiseError::Interpretation {
            step: "do it".into(),
            reason: "nothing usable".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = StepwiseError::NavigationTimeout {
            url: "https://example.com".into(),
            detail: "domcontentloaded after 30s".into(),
        };
        assert_eq!(
            err.to_string(),
            "Navigation to https://example.com timed out: domcontentloaded after 30s"
        );
        assert!(err.is_timeout());
    }
}
