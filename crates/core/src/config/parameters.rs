//! Key/value configuration parameters handed to engines

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Immutable key → string configuration handed to engines
///
/// The launcher never interprets these values; it only carries them from
/// the discovery request to every engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationParameters {
    values: BTreeMap<String, String>,
}

impl ConfigurationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> super::ConfigurationParametersBuilder {
        super::ConfigurationParametersBuilder::new()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// `true`/`false`, case-insensitive. Anything else is `None`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// Parse a value; unparsable values are logged and treated as absent
    pub fn get_as<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(
                    "Ignoring configuration parameter '{}': cannot parse '{}' as {}",
                    key,
                    raw,
                    std::any::type_name::<T>()
                );
                None
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// New parameters where `overrides` replace existing keys
    pub fn with_overrides(&self, overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut values = self.values.clone();
        values.extend(overrides);
        Self { values }
    }
}

impl FromIterator<(String, String)> for ConfigurationParameters {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
