//! Error taxonomy shared by the dispatcher, pipelines and the HTTP boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Coarse error category reported to clients alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Serialization,
    Engine,
    Storage,
    Summarization,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Serialization => "serialization",
            Self::Engine => "engine",
            Self::Storage => "storage",
            Self::Summarization => "summarization",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    /// A required top-level key is absent from the request payload.
    #[error("request data is missing key: {field}")]
    MissingField { field: String },

    #[error("request data specifies unknown disease: {disease}")]
    UnsupportedDisease { disease: String },

    /// The request body is not a JSON object.
    #[error("malformed request body: {message}")]
    MalformedBody { message: String },

    /// Keys are present but their contents cannot describe a scenario.
    #[error("invalid scenario: {message}")]
    InvalidScenario { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("simulation engine error: {message}")]
    Engine { message: String },

    #[error("summarization error: {message}")]
    Summarization { message: String },
}

impl ScenarioError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidScenario {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. }
            | Self::UnsupportedDisease { .. }
            | Self::MalformedBody { .. }
            | Self::InvalidScenario { .. } => ErrorKind::Validation,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Engine { .. } => ErrorKind::Engine,
            Self::Summarization { .. } => ErrorKind::Summarization,
        }
    }

    /// Whether the request shape itself was rejected (HTTP 400) rather than
    /// reported as a logical failure in a 200 body.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. } | Self::UnsupportedDisease { .. } | Self::MalformedBody { .. }
        )
    }

    /// Storage outages and engine crashes may succeed on resubmission; bad
    /// input and bad engine output will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Engine { .. })
    }
}
