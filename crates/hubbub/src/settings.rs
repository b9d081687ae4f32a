//! Server settings.
//!
//! Settings come from an optional JSON file; every field has a default, so
//! an empty object (or no file at all) yields a working local server. The
//! `HUBBUB_BIND_ADDR` environment variable overrides the bind address.
//!
//! ```json
//! {
//!   "bind_addr": "0.0.0.0:8080",
//!   "rooms": ["chat", "roulette"],
//!   "client": { "outbound_queue": 512, "pong_wait_ms": 30000 }
//! }
//! ```

use std::path::{Path, PathBuf};

use hubbub_hub::{ClientConfig, HubConfig, RoomConfig};
use serde::Deserialize;

/// Environment variable that overrides [`Settings::bind_addr`].
pub const BIND_ADDR_ENV: &str = "HUBBUB_BIND_ADDR";

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON of the expected shape.
    #[error("invalid settings: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Everything needed to start a hub server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// Rooms created at startup.
    pub rooms: Vec<String>,
    pub hub: HubConfig,
    /// Applied to every room created at startup.
    pub room: RoomConfig,
    /// Applied to every accepted connection.
    pub client: ClientConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            rooms: Vec::new(),
            hub: HubConfig::default(),
            room: RoomConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `path` if given, then applies environment
    /// overrides.
    ///
    /// # Errors
    /// Returns [`SettingsError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| {
                    SettingsError::Read {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };
        Ok(settings.with_bind_override(std::env::var(BIND_ADDR_ENV).ok()))
    }

    /// Parses settings from JSON text. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`SettingsError::Parse`] on malformed input.
    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(raw).map_err(SettingsError::Parse)
    }

    fn with_bind_override(mut self, bind_addr: Option<String>) -> Self {
        if let Some(addr) = bind_addr.filter(|a| !a.trim().is_empty()) {
            tracing::debug!(%addr, "bind address overridden from environment");
            self.bind_addr = addr;
        }
        self
    }
}
