use std::fmt;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    InvalidRequest,
    HttpTimeout,
    Unavailable,
    InvalidResponse,
    Unknown,
}

impl StoreErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreErrorCode::Unauthorized => "UNAUTHORIZED",
            StoreErrorCode::Forbidden => "FORBIDDEN",
            StoreErrorCode::NotFound => "STORE_NOT_FOUND",
            StoreErrorCode::InvalidRequest => "INVALID_REQUEST",
            StoreErrorCode::HttpTimeout => "HTTP_TIMEOUT",
            StoreErrorCode::Unavailable => "STORE_UNAVAILABLE",
            StoreErrorCode::InvalidResponse => "INVALID_RESPONSE",
            StoreErrorCode::Unknown => "UNKNOWN_STORE_ERROR",
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        details: Option<JsonValue>,
    },

    #[error("{message}")]
    Store {
        code: StoreErrorCode,
        message: String,
        correlation_id: Option<String>,
        details: Option<JsonValue>,
    },

    #[error("conflict resolution aborted after {attempts_used} attempts: {source}")]
    ResolutionAborted {
        attempts_used: u32,
        #[source]
        source: Box<AppError>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            source: None,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            source: None,
            details: Some(details),
        }
    }

    pub fn store(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self::store_with_details(code, message, None, None)
    }

    pub fn store_with_details(
        code: StoreErrorCode,
        message: impl Into<String>,
        correlation_id: Option<&str>,
        details: Option<JsonValue>,
    ) -> Self {
        let message = message.into();
        let correlation = correlation_id.map(|value| value.to_string());
        match (&correlation, &details) {
            (Some(id), Some(payload)) => {
                warn!(
                    target: "app::store::error",
                    code = %code,
                    correlation_id = %id,
                    details = %payload,
                    %message
                );
            }
            (Some(id), None) => {
                warn!(
                    target: "app::store::error",
                    code = %code,
                    correlation_id = %id,
                    %message
                );
            }
            (None, Some(payload)) => {
                warn!(target: "app::store::error", code = %code, details = %payload, %message);
            }
            (None, None) => {
                warn!(target: "app::store::error", code = %code, %message);
            }
        }

        AppError::Store {
            code,
            message,
            correlation_id: correlation,
            details,
        }
    }

    pub fn store_code(&self) -> Option<StoreErrorCode> {
        match self {
            AppError::Store { code, .. } => Some(*code),
            AppError::ResolutionAborted { source, .. } => source.store_code(),
            _ => None,
        }
    }

    pub fn store_correlation_id(&self) -> Option<&str> {
        match self {
            AppError::Store { correlation_id, .. } => correlation_id.as_deref(),
            AppError::ResolutionAborted { source, .. } => source.store_correlation_id(),
            _ => None,
        }
    }

    pub fn store_details(&self) -> Option<&JsonValue> {
        match self {
            AppError::Store { details, .. } => details.as_ref(),
            AppError::ResolutionAborted { source, .. } => source.store_details(),
            _ => None,
        }
    }

    /// Wraps a fatal failure raised mid-run, keeping the attempt count at the point of abort.
    pub fn resolution_aborted(attempts_used: u32, source: AppError) -> Self {
        error!(
            target: "app::resolver",
            attempts_used,
            error = %source,
            "conflict resolution aborted"
        );
        AppError::ResolutionAborted {
            attempts_used,
            source: Box::new(source),
        }
    }

    pub fn attempts_used(&self) -> Option<u32> {
        match self {
            AppError::ResolutionAborted { attempts_used, .. } => Some(*attempts_used),
            _ => None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::config", %message, "configuration error");
        AppError::Config(message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(error: serde_yaml::Error) -> Self {
        AppError::config(format!("failed to parse settings file: {error}"))
    }
}
