//! Settings loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::Settings;
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate settings from TOML text.
pub fn parse_settings(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_settings(&settings).map_err(ConfigError::Validation)?;
    Ok(settings)
}

/// Load and validate settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_settings(&content)
}
