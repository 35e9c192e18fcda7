//! Error handling for hashcash proof-of-work
//!
//! Typed failures for challenge construction, mining, and verification. Every
//! fallible operation in the crate reports one of these; nothing is retried
//! internally.

use crate::cancel::CancelCause;
use crate::core::HashSum;
use crate::layout::LayoutError;
use std::fmt;
use thiserror::Error;

/// Result type alias for hashcash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    /// One or more invariants were violated while constructing a value
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Mining stopped before a solution was found
    #[error("Task interrupted: {0}")]
    Interrupted(#[from] Interruption),

    /// I/O errors, including entropy source failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The pre-image formatter failed
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// A solution did not verify
    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationFailure),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Textual form of a value could not be parsed
    #[error("Invalid {kind}: {message}")]
    Parse { kind: &'static str, message: String },

    /// Worker errors
    #[error("Worker error: {worker_type}: {message}")]
    Worker { worker_type: String, message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error for the named kind of value
    pub fn parse(kind: &'static str, message: impl fmt::Display) -> Self {
        Self::Parse {
            kind,
            message: message.to_string(),
        }
    }

    /// Create a worker error
    pub fn worker(worker_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Worker {
            worker_type: worker_type.into(),
            message: message.into(),
        }
    }

    /// Validation issues carried by this error, if any
    pub fn validation_issues(&self) -> &[ValidationIssue] {
        match self {
            Error::Validation(errors) => errors.issues(),
            _ => &[],
        }
    }

    /// Whether mining was cancelled or ran out of attempts
    pub fn is_interruption(&self) -> bool {
        matches!(self, Error::Interrupted(_))
    }

    /// Check if error is retryable
    ///
    /// An exhausted attempt budget can be retried with a larger budget or a
    /// different starting nonce; a cancellation cannot.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Interrupted(Interruption::AttemptLimitExceeded { .. }) => true,
            Error::Io(_) => true,
            Error::Worker { .. } => true,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Interrupted(_) => "interrupted",
            Error::Io(_) => "io",
            Error::Layout(_) => "layout",
            Error::Verification(_) => "verification",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Config { .. } => "config",
            Error::Parse { .. } => "parse",
            Error::Worker { .. } => "worker",
        }
    }
}

impl From<ValidationIssue> for Error {
    fn from(issue: ValidationIssue) -> Self {
        Error::Validation(ValidationErrors::from(issue))
    }
}

/// A single violated construction invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("either a leading zero bit count or a target bit index is required")]
    DifficultyMissing,

    #[error("only one of leading zero bit count and target bit index may be set")]
    DifficultyAmbiguous,

    #[error("leading zero bit count must be in 0..=4294967295, got {0}")]
    InvalidLeadingZeroBitCount(i64),

    #[error("target bit index must be in 0..=4294967295, got {0}")]
    InvalidTargetBitIndex(i64),

    #[error("leading zero bit count {leading_zero_bit_count} exceeds the {size_in_bits}-bit digest size")]
    LeadingZeroBitCountTooLarge {
        leading_zero_bit_count: u32,
        size_in_bits: u32,
    },

    #[error("target bit index {target_bit_index} exceeds the {size_in_bits}-bit digest size")]
    TargetBitIndexTooLarge {
        target_bit_index: u32,
        size_in_bits: u32,
    },

    #[error("createdAt and ttl must be set together; {missing} is missing")]
    IncompleteLifetime { missing: &'static str },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("layout cannot render this challenge: {0}")]
    LayoutSelfCheck(LayoutError),

    #[error("digest size of {size_in_bytes} bytes is too large")]
    DigestTooLarge { size_in_bytes: usize },

    #[error("hash sum is {actual} bytes but the hash produces {expected}")]
    HashSumLength { expected: usize, actual: usize },

    #[error("nonce must not be negative, got {0}")]
    NegativeNonce(String),

    #[error("random nonce range [{min}, {max}) is empty")]
    EmptyNonceRange { min: String, max: String },

    #[error("hash name must not be empty")]
    EmptyHashName,

    #[error("unknown hash `{0}`")]
    UnknownHash(String),
}

/// Every issue found while validating one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self(issues)
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }

    pub fn contains(&self, issue: &ValidationIssue) -> bool {
        self.0.contains(issue)
    }
}

impl From<ValidationIssue> for ValidationErrors {
    fn from(issue: ValidationIssue) -> Self {
        Self(vec![issue])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, issue) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Why a search stopped without a solution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    #[error("cancelled ({cause})")]
    Cancelled { cause: CancelCause },

    #[error("no solution within {max_attempt_count} attempts")]
    AttemptLimitExceeded { max_attempt_count: u64 },
}

/// Why a solution was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error("recorded hash sum {recorded} does not match computed {computed}")]
    HashSumMismatch { recorded: HashSum, computed: HashSum },

    #[error("hash sum {hash_sum} has fewer than {leading_zero_bit_count} leading zero bits")]
    TargetNotMet {
        leading_zero_bit_count: u32,
        hash_sum: HashSum,
    },

    #[error("challenge lifetime has passed")]
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_display_joins_issues() {
        let errors = ValidationErrors::new(vec![
            ValidationIssue::MissingField("payload"),
            ValidationIssue::DifficultyMissing,
        ]);
        assert_eq!(
            errors.to_string(),
            "payload is required; either a leading zero bit count or a target bit index is required"
        );
    }

    #[test]
    fn test_issue_converts_into_error() {
        let error = Error::from(ValidationIssue::EmptyHashName);
        assert_eq!(error.category(), "validation");
        assert_eq!(error.validation_issues(), &[ValidationIssue::EmptyHashName]);
    }

    #[test]
    fn test_error_classification() {
        let exhausted = Error::from(Interruption::AttemptLimitExceeded {
            max_attempt_count: 10,
        });
        assert!(exhausted.is_interruption());
        assert!(exhausted.is_retryable());

        let cancelled = Error::from(Interruption::Cancelled {
            cause: CancelCause::Requested,
        });
        assert!(cancelled.is_interruption());
        assert!(!cancelled.is_retryable());

        let config = Error::config("bad");
        assert_eq!(config.category(), "config");
        assert!(!config.is_interruption());
        assert!(config.validation_issues().is_empty());
    }
}
