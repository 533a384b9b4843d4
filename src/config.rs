//! Application-level configuration loading: cup layouts and the turn policy.

use std::{collections::BTreeMap, env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{
    cups::{CupFormat, FormatCatalog},
    turn::TurnPolicy,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BEER_PONG_BACK_CONFIG_PATH";

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    formats: FormatCatalog,
    turn_policy: TurnPolicy,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in layouts.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        turn_policy = ?app_config.turn_policy,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Build a configuration from already resolved parts.
    pub fn new(formats: FormatCatalog, turn_policy: TurnPolicy) -> Self {
        Self {
            formats,
            turn_policy,
        }
    }

    /// Cup layouts available to matches.
    pub fn formats(&self) -> &FormatCatalog {
        &self.formats
    }

    pub fn turn_policy(&self) -> TurnPolicy {
        self.turn_policy
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    formats: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    turn_policy: Option<RawTurnPolicy>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawTurnPolicy {
    Free,
    RoundRobin,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let mut formats = FormatCatalog::default();
        for (key, labels) in value.formats {
            let Some(format) = CupFormat::from_key(&key) else {
                warn!(format = %key, "ignoring unknown cup format in config");
                continue;
            };
            if labels.is_empty() {
                warn!(format = %key, "ignoring empty cup layout in config");
                continue;
            }
            formats = formats.with_layout(format, labels);
        }

        let turn_policy = match value.turn_policy {
            Some(RawTurnPolicy::RoundRobin) => TurnPolicy::RoundRobin,
            Some(RawTurnPolicy::Free) | None => TurnPolicy::FreeForAll,
        };

        Self {
            formats,
            turn_policy,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
