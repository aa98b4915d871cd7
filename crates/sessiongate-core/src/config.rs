//! Deployment configuration.
//!
//! Values come from environment-style keys (usually via a `.env` file) or
//! from a JSON file such as `~/.config/sessiongate/config.json`:
//!
//! | key                        | default                         |
//! |----------------------------|---------------------------------|
//! | `AUTH_TYPE`                | `auth` (path policy only)       |
//! | `SESSION_COOKIE_NAME`      | `session_id`                    |
//! | `SESSION_DURATION_SECONDS` | `0` (never expire)              |
//! | `AUTH_EXEMPT_PATHS`        | status / error / login routes   |

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::store::SessionDuration;

/// Application name used for config/data directory paths
const APP_NAME: &str = "sessiongate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_COOKIE_NAME: &str = "session_id";

const DEFAULT_EXEMPT_PATHS: &[&str] = &[
    "/api/v1/status/",
    "/api/v1/unauthorized/",
    "/api/v1/forbidden/",
    "/api/v1/auth_session/login/",
];

/// Which strategy the deployment runs. Picked once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    #[default]
    #[serde(rename = "auth")]
    Plain,
    #[serde(rename = "basic_auth")]
    Basic,
    #[serde(rename = "session_auth")]
    Session,
    #[serde(rename = "session_exp_auth")]
    SessionExp,
    #[serde(rename = "session_db_auth")]
    SessionDb,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Plain => "auth",
            StrategyKind::Basic => "basic_auth",
            StrategyKind::Session => "session_auth",
            StrategyKind::SessionExp => "session_exp_auth",
            StrategyKind::SessionDb => "session_db_auth",
        }
    }

    pub fn uses_sessions(&self) -> bool {
        matches!(
            self,
            StrategyKind::Session | StrategyKind::SessionExp | StrategyKind::SessionDb
        )
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "auth" => Ok(StrategyKind::Plain),
            "basic_auth" => Ok(StrategyKind::Basic),
            "session_auth" => Ok(StrategyKind::Session),
            "session_exp_auth" => Ok(StrategyKind::SessionExp),
            "session_db_auth" => Ok(StrategyKind::SessionDb),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub strategy: StrategyKind,
    pub session_cookie_name: String,
    pub session_duration: SessionDuration,
    pub exempt_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            session_cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            session_duration: SessionDuration::NEVER,
            exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl AuthConfig {
    /// Read from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read from any key/value source on top of the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overlay(lookup)
    }

    /// Apply environment variables on top of `self`.
    pub fn overlay_env(self) -> Result<Self, ConfigError> {
        self.overlay(|key| std::env::var(key).ok())
    }

    /// Apply the keys `lookup` knows about; the rest keep their current
    /// values. An unparsable duration means "never expire".
    pub fn overlay<F>(self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self;

        if let Some(kind) = lookup("AUTH_TYPE") {
            config.strategy = kind.parse()?;
        }
        if let Some(name) = lookup("SESSION_COOKIE_NAME").filter(|n| !n.trim().is_empty()) {
            config.session_cookie_name = name.trim().to_string();
        }
        if let Some(duration) = lookup("SESSION_DURATION_SECONDS") {
            config.session_duration = SessionDuration::parse(&duration);
        }
        if let Some(paths) = lookup("AUTH_EXEMPT_PATHS") {
            config.exempt_paths = paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where record tables (users, sessions) live.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
