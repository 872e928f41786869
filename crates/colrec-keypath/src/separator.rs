use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KeypathError, KeypathResult};

/// Delimiter the artifact uses for hierarchical addressing.
pub const ARTIFACT_DELIMITER: char = '/';

/// A validated keypath separator.
///
/// Non-empty and free of [`ARTIFACT_DELIMITER`]. Once built it cannot be
/// changed, only replaced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Separator(String);

impl Separator {
    pub fn new(separator: impl Into<String>) -> KeypathResult<Self> {
        let separator = separator.into();
        if separator.is_empty() || separator.contains(ARTIFACT_DELIMITER) {
            return Err(KeypathError::InvalidSeparator(separator));
        }
        Ok(Self(separator))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Separator {
    fn default() -> Self {
        Self(".".into())
    }
}

impl TryFrom<String> for Separator {
    type Error = KeypathError;

    fn try_from(value: String) -> KeypathResult<Self> {
        Self::new(value)
    }
}

impl From<Separator> for String {
    fn from(separator: Separator) -> Self {
        separator.0
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
