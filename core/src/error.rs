//! Structured error types for the router
//!
//! Every stage returns `Result<T, RouterError>`. Handlers turn these into
//! failure-tagged strings; only configuration errors are fatal, and only at
//! startup.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for router operations
#[derive(Error, Debug)]
pub enum RouterError {
    // =========================================================================
    // Extraction / Validation Errors
    // =========================================================================
    /// No recoverable structured object in the model output
    #[error("extraction failed: {reason}")]
    Extraction { reason: String, raw: String },

    /// A structured object was found but failed schema/enum validation
    #[error("validation failed: {message}")]
    Validation { message: String },

    // =========================================================================
    // External Collaborator Errors
    // =========================================================================
    /// Search/news/stock API failure (credential, parameter, transport)
    #[error("api error: {message}")]
    Api { message: String },

    /// Text model transport or response failure
    #[error("llm error: {message}")]
    Llm { message: String },

    /// Subprocess or file-write failure
    #[error("execution failed: {message}")]
    Execution { message: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Required configuration missing (file or key)
    #[error("missing required configuration: {key}")]
    MissingConfig { key: String },

    /// Configuration present but invalid
    #[error("invalid configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    // =========================================================================
    // External Error Wrappers
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RouterError {
    pub fn extraction(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Extraction {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    pub fn invalid_config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Short stable tag used in failure strings and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extraction { .. } => "extraction",
            Self::Validation { .. } => "validation",
            Self::Api { .. } => "api",
            Self::Llm { .. } => "llm",
            Self::Execution { .. } => "execution",
            Self::MissingConfig { .. } | Self::InvalidConfig { .. } => "config",
            Self::Io(_) => "io",
            Self::Json(_) | Self::Yaml(_) | Self::Toml(_) => "parse",
        }
    }

    /// Only configuration problems abort the process, and only at startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingConfig { .. } | Self::InvalidConfig { .. })
    }
}

/// Result type alias using RouterError
pub type Result<T> = std::result::Result<T, RouterError>;

/// Extension trait for converting Option to Result with RouterError
pub trait OptionExt<T> {
    fn ok_or_missing(self, key: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, key: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| RouterError::MissingConfig { key: key.into() })
    }
}
