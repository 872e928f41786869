use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use colrec_keypath::{KeypathConfig, Separator};
use colrec_store::{Compression, StoreConfig, SyncMode, DEFAULT_CHUNK_ROWS};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RecorderError, RecorderResult};

pub const DEFAULT_FOLDER_PATH: &str = "./fallback_data/";
pub const DEFAULT_HEALTH_STATUS_PERIOD_MS: u64 = 500;
/// Fields carried by every message that do not by themselves make a record
/// worth storing.
pub const DEFAULT_BOOKKEEPING_FIELDS: [&str; 3] = ["timecode", "timestamp", "hostname"];

/// Recorder configuration.
///
/// Every field has a default, so a partial TOML file or params object is
/// always valid input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub keypath_sep: String,
    pub folder_path: PathBuf,
    /// Ordered field paths per group.
    pub keypaths: BTreeMap<String, Vec<String>>,
    /// Milliseconds between health reports.
    pub health_status_period: u64,
    pub agent_id: Option<String>,
    pub bookkeeping_fields: Vec<String>,
    pub chunk_rows: usize,
    /// zstd level for chunk payloads; uncompressed when unset.
    pub compression_level: Option<i32>,
    pub sync: SyncMode,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            keypath_sep: ".".to_string(),
            folder_path: PathBuf::from(DEFAULT_FOLDER_PATH),
            keypaths: BTreeMap::new(),
            health_status_period: DEFAULT_HEALTH_STATUS_PERIOD_MS,
            agent_id: None,
            bookkeeping_fields: DEFAULT_BOOKKEEPING_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            chunk_rows: DEFAULT_CHUNK_ROWS,
            compression_level: None,
            sync: SyncMode::default(),
        }
    }
}

impl RecorderConfig {
    /// Load from a `.toml` or `.json` file, chosen by extension.
    pub fn from_file(path: &Path) -> RecorderResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text)?,
            Some("toml") | None => Self::from_toml_str(&text)?,
            Some(other) => {
                return Err(RecorderError::Config(format!(
                    "unsupported config extension .{other}"
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> RecorderResult<Self> {
        toml::from_str(text).map_err(|e| RecorderError::Config(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> RecorderResult<Self> {
        serde_json::from_str(text).map_err(|e| RecorderError::Config(e.to_string()))
    }

    /// Build from a host-style params object patched over the defaults.
    ///
    /// Top-level `null` entries fall back to their default.
    pub fn from_params(params: &Value) -> RecorderResult<Self> {
        let mut params = match params {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let Value::Object(map) = &mut params else {
            return Err(RecorderError::Config("params must be an object".into()));
        };
        map.retain(|_, v| !v.is_null());
        let config: Self =
            serde_json::from_value(params).map_err(|e| RecorderError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RecorderResult<()> {
        Separator::new(self.keypath_sep.as_str())?;
        if self.health_status_period == 0 {
            return Err(RecorderError::Config(
                "health_status_period must be positive".into(),
            ));
        }
        self.store_config().validate()?;
        self.keypath_config()?;
        Ok(())
    }

    /// Keypaths as appended one by one, so each group is seeded with the
    /// default fields ahead of its configured ones.
    pub fn keypath_config(&self) -> RecorderResult<KeypathConfig> {
        let mut keypaths = KeypathConfig::new(Separator::new(self.keypath_sep.as_str())?);
        for (group, paths) in &self.keypaths {
            for path in paths {
                keypaths.append_keypath(path, group)?;
            }
        }
        Ok(keypaths)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            chunk_rows: self.chunk_rows,
            compression: self
                .compression_level
                .map_or(Compression::None, |level| Compression::Zstd { level }),
            sync_mode: self.sync,
        }
    }

    pub fn health_period(&self) -> Duration {
        Duration::from_millis(self.health_status_period)
    }
}
