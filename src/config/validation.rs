//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check driver sections name a driver
//! - Reject namespaces that would make physical keys ambiguous
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Settings → Result<(), Vec<ValidationError>>
//! - Driver names are checked against a registry by the caller, not here

use std::fmt;

use crate::config::schema::Settings;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyDriver { section: &'static str },
    NamespaceSeparator { namespace: String },
    UnknownLogLevel { level: String },
    ZeroReconnectDelay,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyDriver { section } => {
                write!(f, "{}.driver must not be empty", section)
            }
            ValidationError::NamespaceSeparator { namespace } => {
                write!(f, "namespace {:?} must not contain ':'", namespace)
            }
            ValidationError::UnknownLogLevel { level } => {
                write!(f, "log_level {:?} is not one of {}", level, LOG_LEVELS.join("/"))
            }
            ValidationError::ZeroReconnectDelay => {
                write!(f, "sync.reconnect_delay_ms must be greater than 0")
            }
        }
    }
}

/// Check `settings`, collecting every problem found.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.storage.driver.trim().is_empty() {
        errors.push(ValidationError::EmptyDriver { section: "storage" });
    }
    if settings.monitor.driver.trim().is_empty() {
        errors.push(ValidationError::EmptyDriver { section: "monitor" });
    }
    if settings.namespace.contains(':') {
        errors.push(ValidationError::NamespaceSeparator {
            namespace: settings.namespace.clone(),
        });
    }
    if !LOG_LEVELS.contains(&settings.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel {
            level: settings.log_level.clone(),
        });
    }
    if settings.sync.reconnect_delay_ms == 0 {
        errors.push(ValidationError::ZeroReconnectDelay);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_settings(&Settings::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut settings = Settings::default();
        settings.namespace = "prod:eu".into();
        settings.storage.driver = String::new();
        settings.log_level = "loud".into();
        settings.sync.reconnect_delay_ms = 0;

        let errors = validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::EmptyDriver { section: "storage" }));
        assert!(errors.contains(&ValidationError::ZeroReconnectDelay));
    }
}
