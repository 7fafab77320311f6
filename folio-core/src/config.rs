//! Configuration management for folio

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: ThemeVariant,
    pub layout: LayoutMode,
    pub live_preview: bool,
    /// Start in read-only view mode instead of the editor.
    pub view_mode: bool,
    pub autosave: AutosaveConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeVariant {
    Dark,
    Light,
}

impl ThemeVariant {
    /// Theme name understood by the diagram engine.
    pub fn diagram_theme(&self) -> &'static str {
        match self {
            ThemeVariant::Dark => "dark",
            ThemeVariant::Light => "default",
        }
    }
}

/// How spreads are presented: both pages side by side, or one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutMode {
    Book,
    Page,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,
    /// Seconds between debounced persistence attempts.
    pub interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: ThemeVariant::Dark,
            layout: LayoutMode::Book,
            live_preview: true,
            view_mode: false,
            autosave: AutosaveConfig::default(),
        }
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
        }
    }
}

impl Config {
    /// Get the platform-specific config file path
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "folio")
            .map(|proj_dirs| proj_dirs.config_dir().join("folio.toml"))
    }

    /// Load configuration from the platform config file, falling back to
    /// defaults when the file is missing.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from a specific path (for testing)
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        // Reject world-writable config files (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = std::fs::metadata(path)?;
            let perms = metadata.permissions();
            if perms.mode() & 0o002 != 0 {
                anyhow::bail!(
                    "Config file {} is world-writable (insecure permissions)",
                    path.display()
                );
            }
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
