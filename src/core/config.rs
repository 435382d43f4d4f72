use crate::core::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Per-engine run configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Label attached to every log line of runs started by the engine
    pub label: Option<String>,
    /// Maximum number of jobs a parallel run keeps in flight (None = all at once).
    /// Serial disciplines always run one job at a time.
    pub max_in_flight: Option<usize>,
}

impl RunConfig {
    /// Parallel runs bounded to `limit` concurrent jobs
    pub fn bounded(limit: usize) -> Self {
        Self {
            label: None,
            max_in_flight: Some(limit),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == Some(0) {
            return Err(EngineError::configuration_field(
                "max_in_flight must be greater than 0",
                "max_in_flight",
            ));
        }
        if let Some(label) = &self.label {
            if label.trim().is_empty() {
                return Err(EngineError::configuration_field(
                    "label cannot be blank",
                    "label",
                ));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parallel dispatch bound
    pub(crate) fn parallel_limit(&self) -> usize {
        self.max_in_flight.unwrap_or(usize::MAX)
    }
}
