use crate::iterate::types::Results;
use thiserror::Error;

/// Errors raised by the engine itself, never by a run.
///
/// Worker failures travel through [`RunFailure`] instead; they are opaque to
/// the engine and handed back verbatim.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// No tokio runtime to defer work onto
    #[error("No async runtime available for {operation}")]
    NoRuntime { operation: String },

    /// The run was dropped before it could deliver an outcome
    #[error("Run abandoned before completion: {run_id}")]
    Abandoned { run_id: String },

    /// Subscriber installation errors
    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    /// Serialization errors
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl EngineError {
    /// Create a configuration error pointing at a field
    pub fn configuration_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn no_runtime<S: Into<String>>(operation: S) -> Self {
        Self::NoRuntime {
            operation: operation.into(),
        }
    }

    pub fn abandoned<S: Into<String>>(run_id: S) -> Self {
        Self::Abandoned {
            run_id: run_id.into(),
        }
    }

    pub fn logging<S: Into<String>>(message: S) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::NoRuntime { .. } => "runtime",
            Self::Abandoned { .. } => "abandoned",
            Self::Logging { .. } => "logging",
            Self::Serialization { .. } => "serialization",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err)
    }
}

/// The first worker error of a run together with the salvaged results.
///
/// `results` only holds entries whose jobs completed successfully before the
/// run terminated, all under their original keys.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("run failed: {error}")]
pub struct RunFailure<V, E> {
    pub error: E,
    pub results: Results<V>,
}

impl<V, E> RunFailure<V, E> {
    pub fn new(error: E, results: Results<V>) -> Self {
        Self { error, results }
    }

    /// Split into the worker error and the salvaged results
    pub fn into_parts(self) -> (E, Results<V>) {
        (self.error, self.results)
    }
}

/// What a run hands to its callback.
pub type Outcome<V, E> = std::result::Result<Results<V>, RunFailure<V, E>>;
