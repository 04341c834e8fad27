//! Top-level configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_core::{Error, Result};
use tessera_reactive::BatchConfig;
use tessera_selector::SelectorConfig;

/// Settings for an [`crate::AppStateContext`].
///
/// Every field has a default, so a partial document such as
/// `{"subscriptions": {"enabled": true}}` is valid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    pub selectors: SelectorConfig,
    pub subscriptions: BatchConfig,
}

impl TesseraConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| Error::config(format!("cannot read {}: {err}", path.display())))?;
        Self::from_json_str(&json)
    }
}
