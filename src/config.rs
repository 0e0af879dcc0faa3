//! Builder settings with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/sr-template/sr-template.toml`
//! 3. Local config: a file passed by the caller
//! 4. Environment variables: `SR_TEMPLATE_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::template::{TemplateError, TemplateResult};
use crate::util::uid::{is_valid_uid, MAX_GENERATED_UID_ROOT_LENGTH, UUID_UID_ROOT};

/// Settings of a template builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Create the measurement group when the builder is constructed
    pub create_group: bool,
    /// Root of generated tracking unique identifiers
    pub uid_root: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            create_group: false,
            uid_root: UUID_UID_ROOT.to_string(),
        }
    }
}

/// Raw settings for intermediate parsing (`None` → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub create_group: Option<bool>,
    pub uid_root: Option<String>,
}

/// Get the XDG config directory.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sr-template").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("sr-template.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> TemplateResult<RawSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| TemplateError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| TemplateError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn config_err(e: config::ConfigError) -> TemplateError {
    TemplateError::Config {
        message: e.to_string(),
    }
}

impl Settings {
    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            create_group: overlay.create_group.unwrap_or(self.create_group),
            uid_root: overlay
                .uid_root
                .clone()
                .unwrap_or_else(|| self.uid_root.clone()),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_config` - Optional path of a TOML file; a missing file is skipped
    pub fn load(local_config: Option<&Path>) -> TemplateResult<Self> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("load: global config {}", global_path.display());
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(local_path) = local_config {
            if local_path.exists() {
                debug!("load: local config {}", local_path.display());
                current = current.merge_with(&load_raw_settings(local_path)?);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.validate()?;
        Ok(current)
    }

    /// Apply SR_TEMPLATE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> TemplateResult<Self> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("SR_TEMPLATE"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_bool("create_group") {
            settings.create_group = val;
        }
        if let Ok(val) = config.get_string("uid_root") {
            settings.uid_root = val;
        }
        Ok(settings)
    }

    /// `uid_root` must be a UID short enough to take a UUID suffix.
    pub fn validate(&self) -> TemplateResult<()> {
        if !is_valid_uid(&self.uid_root) {
            return Err(TemplateError::Config {
                message: format!("uid_root '{}' is not a valid UID", self.uid_root),
            });
        }
        if self.uid_root.len() > MAX_GENERATED_UID_ROOT_LENGTH {
            return Err(TemplateError::Config {
                message: format!(
                    "uid_root '{}' has {} characters, generated UIDs need a root of at most {}",
                    self.uid_root,
                    self.uid_root.len(),
                    MAX_GENERATED_UID_ROOT_LENGTH
                ),
            });
        }
        Ok(())
    }
}
