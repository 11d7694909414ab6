// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script system configuration.
//!
//! Persisted as RON next to the project:
//!
//! ```ron
//! ScriptConfig(
//!     config_version: 1,
//!     cycle_policy: Strict,
//!     discard_on_save: true,
//!     format: Json,
//!     file_extension: "schematyc",
//! )
//! ```

use crate::dependency::CyclePolicy;
use crate::store::StoreFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "scripts.ron";

/// Configuration load/save failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON for [`ScriptConfig`]
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer build
    #[error("Config version {found} is newer than supported version {supported}")]
    TooNew {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}

/// Script system settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Settings format version
    pub config_version: u32,
    /// What to do when a load/save batch has circular dependencies
    pub cycle_policy: CyclePolicy,
    /// Skip elements flagged "discard" when saving
    pub discard_on_save: bool,
    /// Build version stamped into saved documents
    pub build_version: String,
    /// On-disk document representation
    pub format: StoreFormat,
    /// Document file extension, without the dot
    pub file_extension: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_FORMAT_VERSION,
            cycle_policy: CyclePolicy::default(),
            discard_on_save: true,
            build_version: env!("CARGO_PKG_VERSION").to_string(),
            format: StoreFormat::default(),
            file_extension: "schematyc".to_string(),
        }
    }
}

impl ScriptConfig {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ScriptConfig = ron::from_str(&content)?;

        if config.config_version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::TooNew {
                found: config.config_version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }

        tracing::debug!("Loaded script config from {}", path.display());
        Ok(config)
    }

    /// Load settings if the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Whether `path` has the configured document extension
    pub fn is_document_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.file_extension))
    }
}
