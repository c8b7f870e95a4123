use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Characters that may not appear in a tag because tag expressions use them
pub const RESERVED_TAG_CHARACTERS: &[char] = &[',', '(', ')', '&', '|', '!'];

/// A validated tag attached to a descriptor
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestTag(String);

impl TestTag {
    /// Create a tag, trimming surrounding whitespace
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(Error::InvalidTag("tag must not be blank".to_string()));
        }
        if let Some(c) = name
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || RESERVED_TAG_CHARACTERS.contains(c))
        {
            return Err(Error::InvalidTag(format!(
                "tag '{name}' contains illegal character {c:?}"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn is_valid(name: &str) -> bool {
        Self::new(name).is_ok()
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TestTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TestTag> for String {
    fn from(tag: TestTag) -> Self {
        tag.0
    }
}
