use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("missing required option {0:?}")]
    Missing(String),

    #[error("option {name:?} has an unexpected type: {source}")]
    Invalid {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("options cannot be decoded: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Free-form driver options, as read from a settings table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(serde_json::Map<String, serde_json::Value>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Typed value of `name`; `Ok(None)` when it is not set.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, OptionsError> {
        match self.0.get(name) {
            None => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|source| OptionsError::Invalid {
                    name: name.to_string(),
                    source,
                }),
        }
    }

    /// Like [`Options::get`] but a missing option is an error.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, OptionsError> {
        self.get(name)?
            .ok_or_else(|| OptionsError::Missing(name.to_string()))
    }

    /// Decode the whole bag into a typed options struct.
    pub fn to_object<T: DeserializeOwned>(&self) -> Result<T, OptionsError> {
        serde_json::from_value(serde_json::Value::Object(self.0.clone()))
            .map_err(OptionsError::Decode)
    }
}

impl FromIterator<(String, serde_json::Value)> for Options {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct RedisOptions {
        address: String,
        db: u8,
        #[serde(default)]
        password: Option<String>,
    }

    #[test]
    fn test_get_typed() {
        let opts = Options::new().with("db", 2).with("address", "127.0.0.1:6379");
        assert_eq!(opts.get::<u8>("db").unwrap(), Some(2));
        assert_eq!(opts.get::<String>("missing").unwrap(), None);
        assert!(matches!(opts.get::<bool>("db"), Err(OptionsError::Invalid { .. })));
        assert!(matches!(opts.require::<String>("password"), Err(OptionsError::Missing(_))));
    }

    #[test]
    fn test_to_object() {
        let opts = Options::new().with("db", 2).with("address", "127.0.0.1:6379");
        let parsed: RedisOptions = opts.to_object().unwrap();
        assert_eq!(
            parsed,
            RedisOptions { address: "127.0.0.1:6379".into(), db: 2, password: None }
        );
    }

    #[test]
    fn test_deserialize_from_toml_table() {
        let opts: Options =
            toml::from_str("path = \"/tmp/store.json\"\npoll_interval_ms = 500").unwrap();
        assert_eq!(opts.get::<String>("path").unwrap().as_deref(), Some("/tmp/store.json"));
        assert_eq!(opts.get::<u64>("poll_interval_ms").unwrap(), Some(500));
    }
}
