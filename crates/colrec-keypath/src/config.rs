use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{KeypathError, KeypathResult};
use crate::resolve::resolve;
use crate::separator::Separator;

/// Fields seeded into a group the first time [`KeypathConfig::append_keypath`]
/// names it.
pub const DEFAULT_SEEDED_FIELDS: [&str; 2] = ["timecode", "timestamp"];

/// Ordered keypaths per group plus the global separator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeypathConfig {
    separator: Separator,
    groups: BTreeMap<String, Vec<String>>,
}

impl KeypathConfig {
    pub fn new(separator: Separator) -> Self {
        Self {
            separator,
            groups: BTreeMap::new(),
        }
    }

    pub fn builder() -> KeypathConfigBuilder {
        KeypathConfigBuilder::default()
    }

    pub fn separator(&self) -> &Separator {
        &self.separator
    }

    /// Append `keypath` to `group`.
    ///
    /// A group named here for the first time is seeded with
    /// [`DEFAULT_SEEDED_FIELDS`] ahead of the appended keypath.
    pub fn append_keypath(&mut self, keypath: &str, group: &str) -> KeypathResult<()> {
        validate(group, keypath)?;
        let paths = self.groups.entry(group.to_string()).or_insert_with(|| {
            debug!(group, "seeding default keypaths");
            DEFAULT_SEEDED_FIELDS.iter().map(|s| s.to_string()).collect()
        });
        paths.push(keypath.to_string());
        Ok(())
    }

    /// Replace all keypaths of `group`, without seeding defaults.
    pub fn set_keypaths<I, S>(&mut self, group: &str, keypaths: I) -> KeypathResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if group.is_empty() {
            return Err(KeypathError::EmptyGroupName);
        }
        let keypaths: Vec<String> = keypaths.into_iter().map(Into::into).collect();
        for keypath in &keypaths {
            validate(group, keypath)?;
        }
        self.groups.insert(group.to_string(), keypaths);
        Ok(())
    }

    /// Configured groups, in name order.
    pub fn groups(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Keypaths of `group`, in configured order.
    pub fn keypaths(&self, group: &str) -> KeypathResult<Vec<String>> {
        self.groups
            .get(group)
            .cloned()
            .ok_or_else(|| KeypathError::UnknownGroup(group.to_string()))
    }

    /// Total number of keypaths over all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every keypath qualified by its group, e.g. `coordinator.x`.
    pub fn qualified_keypaths(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|(group, paths)| {
                paths
                    .iter()
                    .map(move |path| format!("{group}{}{path}", self.separator))
            })
            .collect()
    }

    /// Resolve every keypath of `group` against `record`, skipping absent ones.
    pub fn resolve_group<'a>(
        &self,
        group: &str,
        record: &'a Value,
    ) -> KeypathResult<Vec<(&str, &'a Value)>> {
        let paths = self
            .groups
            .get(group)
            .ok_or_else(|| KeypathError::UnknownGroup(group.to_string()))?;
        Ok(paths
            .iter()
            .filter_map(|path| resolve(record, path, &self.separator).map(|v| (path.as_str(), v)))
            .collect())
    }
}

fn validate(group: &str, keypath: &str) -> KeypathResult<()> {
    if group.is_empty() {
        return Err(KeypathError::EmptyGroupName);
    }
    if keypath.is_empty() {
        return Err(KeypathError::EmptyKeypath {
            group: group.to_string(),
        });
    }
    Ok(())
}

/// Builds a [`KeypathConfig`], validating everything in [`Self::build`].
#[derive(Clone, Debug)]
pub struct KeypathConfigBuilder {
    separator: String,
    keypaths: Vec<(String, String)>,
}

impl Default for KeypathConfigBuilder {
    fn default() -> Self {
        Self {
            separator: ".".into(),
            keypaths: Vec::new(),
        }
    }
}

impl KeypathConfigBuilder {
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Queue a keypath for `group`; applied with seeding semantics.
    pub fn keypath(mut self, group: impl Into<String>, keypath: impl Into<String>) -> Self {
        self.keypaths.push((group.into(), keypath.into()));
        self
    }

    pub fn keypaths<I, S>(mut self, group: &str, keypaths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keypaths
            .extend(keypaths.into_iter().map(|k| (group.to_string(), k.into())));
        self
    }

    pub fn build(self) -> KeypathResult<KeypathConfig> {
        let mut config = KeypathConfig::new(Separator::new(self.separator)?);
        for (group, keypath) in &self.keypaths {
            config.append_keypath(keypath, group)?;
        }
        Ok(config)
    }
}
