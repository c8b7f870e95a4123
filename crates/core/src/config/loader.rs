//! Layered construction of [`ConfigurationParameters`]
//!
//! Precedence, highest first: explicit parameters, `TRELLIS_*` environment
//! variables, then a JSON configuration file.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::ConfigurationParameters;
use crate::error::{Error, Result};

/// File names looked up by [`ConfigurationParametersBuilder::with_discovered_file`]
pub const CONFIG_FILE_NAMES: &[&str] = &[".trellis.json", "trellis.json"];

/// Prefix of environment variables mapped onto configuration keys
pub const ENV_PREFIX: &str = "TRELLIS_";

#[derive(Debug, Default)]
pub struct ConfigurationParametersBuilder {
    explicit: BTreeMap<String, String>,
    environment: BTreeMap<String, String>,
    file: BTreeMap<String, String>,
    file_path: Option<PathBuf>,
}

impl ConfigurationParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.explicit.insert(key.into(), value.into());
        self
    }

    pub fn parameters(mut self, parameters: impl IntoIterator<Item = (String, String)>) -> Self {
        self.explicit.extend(parameters);
        self
    }

    /// Read `TRELLIS_*` variables from the process environment
    pub fn with_env(self) -> Self {
        self.with_env_vars(std::env::vars())
    }

    /// Map `TRELLIS_FOO_BAR=1` onto `trellis.foo.bar=1`
    pub fn with_env_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        for (name, value) in vars {
            if let Some(key) = env_var_to_key(&name) {
                tracing::debug!("Configuration parameter '{}' taken from ${}", key, name);
                self.environment.insert(key, value);
            }
        }
        self
    }

    /// Load a JSON configuration file
    pub fn with_file(mut self, path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents).map_err(|e| {
            Error::ConfigError(format!("Failed to parse {}: {e}", path.display()))
        })?;
        let Value::Object(map) = value else {
            return Err(Error::ConfigError(format!(
                "{} must contain a JSON object",
                path.display()
            )));
        };

        let mut flattened = BTreeMap::new();
        for (key, value) in map {
            flatten(&key, value, &mut flattened)?;
        }
        tracing::debug!(
            "Loaded {} configuration parameters from {:?}",
            flattened.len(),
            path
        );
        self.file = flattened;
        self.file_path = Some(path.to_path_buf());
        Ok(self)
    }

    /// Walk up from `start` and load the first configuration file found.
    /// Finding none is not an error.
    pub fn with_discovered_file(self, start: &Path) -> Result<Self> {
        match find_config_file(start) {
            Some(path) => self.with_file(&path),
            None => {
                tracing::debug!("No configuration file found above {:?}", start);
                Ok(self)
            }
        }
    }

    /// The file loaded by [`with_file`](Self::with_file), if any
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn build(self) -> ConfigurationParameters {
        let mut values = self.file;
        values.extend(self.environment);
        values.extend(self.explicit);
        values.into_iter().collect()
    }
}

pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
    let mut current = if start_path.is_file() {
        start_path.parent()?
    } else {
        start_path
    };

    loop {
        for name in CONFIG_FILE_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        current = current.parent()?;
    }
}

fn env_var_to_key(name: &str) -> Option<String> {
    let rest = name.strip_prefix(ENV_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    Some(format!("trellis.{}", rest.to_ascii_lowercase().replace('_', ".")))
}

fn flatten(prefix: &str, value: Value, out: &mut BTreeMap<String, String>) -> Result<()> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s);
        }
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => parts.push(s),
                    Value::Bool(b) => parts.push(b.to_string()),
                    Value::Number(n) => parts.push(n.to_string()),
                    _ => {
                        return Err(Error::ConfigError(format!(
                            "'{prefix}' may only contain scalar values"
                        )));
                    }
                }
            }
            out.insert(prefix.to_string(), parts.join(","));
        }
        Value::Object(map) => {
            for (key, nested) in map {
                flatten(&format!("{prefix}.{key}"), nested, out)?;
            }
        }
    }
    Ok(())
}
