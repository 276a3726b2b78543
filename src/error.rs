//! Crate-level error type.

use thiserror::Error;

use crate::backend::{BackendError, OptionsError, RegistryError};
use crate::config::ConfigError;
use crate::convert::ConvertError;
use crate::schema::ShapeError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("failed to convert value of {key}: {source}")]
    Convert {
        key: String,
        #[source]
        source: ConvertError,
    },

    #[error("config {name:?} is already registered with a different instance")]
    DuplicateConfig { name: String },

    #[error("key {key:?} in namespace {namespace:?} is already bound to another field")]
    KeyCollision { namespace: String, key: String },

    #[error("liveconf for namespace {0:?} is closed")]
    Closed(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::KeyCollision {
            namespace: "prod".into(),
            key: "A:Port".into(),
        };
        assert_eq!(
            err.to_string(),
            "key \"A:Port\" in namespace \"prod\" is already bound to another field"
        );

        let err: Error = BackendError::AlreadyWatching("prod".into()).into();
        assert_eq!(err.to_string(), "namespace \"prod\" is already being watched");
    }
}
