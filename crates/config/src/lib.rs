//! Client-side configuration and persisted UI state for the orbital-map client.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime configuration for the client: where the server lives and how often to poll it.
///
/// Loaded from a single TOML file; any field missing from the file falls back to its default,
/// so a user's config only needs to mention the values they're overriding.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub locations_poll_interval_s: f64,
    pub state_poll_interval_s: f64,
    pub org_poll_interval_s: f64,
    pub anchor_cache_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_base_url: "http://localhost:8080".to_string(),
            locations_poll_interval_s: 5.0,
            state_poll_interval_s: 1.0,
            org_poll_interval_s: 30.0,
            anchor_cache_capacity: orbitmap_core::constants::ANCHOR_CACHE_CAPACITY,
        }
    }
}

/// Per-panel layout, persisted across sessions.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct PanelLayout {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub open: bool,
    pub minimized: bool,
}

/// The persisted layout of every named panel, keyed by panel id.
///
/// Mirrors the browser client's single local-storage key: one JSON blob mapping panel id to
/// its geometry. A malformed or missing file is treated as an empty store rather than an error.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PanelLayoutStore {
    #[serde(flatten)]
    panels: BTreeMap<String, PanelLayout>,
}

impl PanelLayoutStore {
    pub fn get(&self, panel_id: &str) -> Option<PanelLayout> {
        self.panels.get(panel_id).copied()
    }

    pub fn set(&mut self, panel_id: impl Into<String>, layout: PanelLayout) {
        self.panels.insert(panel_id.into(), layout);
    }

    pub fn remove(&mut self, panel_id: &str) {
        self.panels.remove(panel_id);
    }
}

/// Errors that can occur while loading or saving client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to serialize TOML config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("failed to parse panel layout JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load client configuration from `path`, falling back to defaults if the file does not exist.
pub fn load_client_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Persist client configuration to `path`, creating parent directories as needed.
pub fn save_client_config<P: AsRef<Path>>(path: P, config: &ClientConfig) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Load the persisted panel layout store from `path`. A missing or malformed file yields an
/// empty store, per the client surface's "malformed reads fall back to empty" rule.
pub fn load_panel_layout<P: AsRef<Path>>(path: P) -> PanelLayoutStore {
    let path = path.as_ref();
    std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| serde_json::from_str(&contents).ok())
        .unwrap_or_default()
}

/// Persist the panel layout store to `path`, creating parent directories as needed.
pub fn save_panel_layout<P: AsRef<Path>>(
    path: P,
    store: &PanelLayoutStore,
) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(store)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_client_config_yields_defaults() {
        let config = load_client_config("/nonexistent/path/orbitmap.toml").unwrap();
        assert_eq!(config.api_base_url, ClientConfig::default().api_base_url);
    }

    #[test]
    fn client_config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbitmap.toml");
        let mut config = ClientConfig::default();
        config.api_base_url = "https://example.test".to_string();
        save_client_config(&path, &config).unwrap();
        let reloaded = load_client_config(&path).unwrap();
        assert_eq!(reloaded.api_base_url, "https://example.test");
    }

    #[test]
    fn malformed_panel_layout_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, "not json").unwrap();
        let store = load_panel_layout(&path);
        assert!(store.get("infoPanel").is_none());
    }

    #[test]
    fn panel_layout_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let mut store = PanelLayoutStore::default();
        store.set(
            "infoPanel",
            PanelLayout {
                left: 10.0,
                top: 20.0,
                width: 300.0,
                height: 400.0,
                open: true,
                minimized: false,
            },
        );
        save_panel_layout(&path, &store).unwrap();
        let reloaded = load_panel_layout(&path);
        assert_eq!(reloaded.get("infoPanel"), store.get("infoPanel"));
    }
}
