//! SinkOptions - the validated settings every sink shares
//!
//! Built once at configure time from a [`SinkConfig`]. Holds the field-name
//! list and the optional eligibility window, and answers the window check so
//! every sink variant filters identically.

use chrono::NaiveDateTime;

use crate::{ContractError, SinkConfig, TimeWindow};

/// Shared, immutable sink settings
#[derive(Debug, Clone, PartialEq)]
pub struct SinkOptions {
    /// Sink name (used for logging/metrics)
    pub name: String,

    /// Ordered field names (CSV column order)
    pub field_names: Vec<String>,

    /// Eligibility window, `None` = unrestricted
    pub window: Option<TimeWindow>,
}

impl SinkOptions {
    /// Unrestricted options
    pub fn new(name: impl Into<String>, field_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            field_names,
            window: None,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Validate the shared part of a sink configuration
    ///
    /// # Errors
    /// `ConfigValidation` when the name is empty or only one of
    /// `from_hour` / `to_hour` is set.
    pub fn from_config(config: &SinkConfig) -> Result<Self, ContractError> {
        if config.name.is_empty() {
            return Err(ContractError::config_validation(
                "name",
                "sink name cannot be empty",
            ));
        }

        let window = match (config.from_hour, config.to_hour) {
            (Some(from), Some(to)) => Some(TimeWindow::new(from, to)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ContractError::config_validation(
                    format!("sinks[{}].to_hour", config.name),
                    "to_hour is required when from_hour is set",
                ))
            }
            (None, Some(_)) => {
                return Err(ContractError::config_validation(
                    format!("sinks[{}].from_hour", config.name),
                    "from_hour is required when to_hour is set",
                ))
            }
        };

        Ok(Self {
            name: config.name.clone(),
            field_names: config.field_names.clone(),
            window,
        })
    }

    /// Whether a record stamped `timestamp` should be delivered
    pub fn is_eligible(&self, timestamp: &NaiveDateTime) -> bool {
        self.window
            .map_or(true, |window| window.contains_timestamp(timestamp))
    }
}

/// Fetch a required type-specific parameter
///
/// # Errors
/// `ConfigValidation` naming the missing key.
pub fn require_param<'a>(config: &'a SinkConfig, key: &str) -> Result<&'a str, ContractError> {
    config.param(key).ok_or_else(|| {
        ContractError::config_validation(
            format!("sinks[{}].params.{}", config.name, key),
            format!("'{}' is required for {:?} sinks", key, config.sink_type),
        )
    })
}
