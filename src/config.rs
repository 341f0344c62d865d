//! User configuration, stored as TOML under the platform config directory.
//!
//! API keys are not part of the config; they live in the OS keychain
//! (see `keychain`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assistant::session::DEFAULT_MAX_EXCHANGES;
use crate::assistant::Provider;
use crate::pricing::PriceSettings;

pub const APP_DIR: &str = "sinapsis-desk";
const CONFIG_FILE: &str = "config.toml";
const STORE_FILE: &str = "workshop.db";
const HISTORY_FILE: &str = "chat_history.db";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub assistant: AssistantConfig,
    pub store: StoreConfig,
    /// Prices used until the store holds a settings document.
    pub pricing: PriceSettings,
    pub stock: StockConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub provider: Provider,
    /// Falls back to the provider's default model.
    pub model: Option<String>,
    /// Override the provider endpoint, e.g. for a proxy.
    pub base_url: Option<String>,
    pub max_tool_rounds: usize,
    /// Exchanges kept in the transcript sent to the model.
    pub max_exchanges: usize,
    pub persist_transcript: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            base_url: None,
            max_tool_rounds: 4,
            max_exchanges: DEFAULT_MAX_EXCHANGES,
            persist_transcript: true,
        }
    }
}

impl AssistantConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StockConfig {
    /// Custom restock threshold table; the built-in one is used when unset.
    pub rules_path: Option<PathBuf>,
}

/// `<config dir>/sinapsis-desk/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

impl DeskConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: DeskConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from the default location, or defaults if there is none.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write config {:?}", path))?;
        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Where the workshop database and transcript live.
    pub fn data_dir(&self) -> PathBuf {
        self.store.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir().join(STORE_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir().join(HISTORY_FILE)
    }
}
