use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::Session;
use crate::util::expand_tilde;

pub const URL_ENV: &str = "ROBOSCRIPT_SUPABASE_URL";
pub const ANON_KEY_ENV: &str = "ROBOSCRIPT_SUPABASE_ANON_KEY";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub version: u32,
    #[serde(default)]
    pub supabase_url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            supabase_url: String::new(),
            anon_key: String::new(),
            session: None,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Environment variables win over the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(URL_ENV) {
            if !url.trim().is_empty() {
                self.supabase_url = url.trim().to_string();
            }
        }
        if let Ok(key) = std::env::var(ANON_KEY_ENV) {
            if !key.trim().is_empty() {
                self.anon_key = key.trim().to_string();
            }
        }
        self
    }

    /// Fail early when the hosted service is not configured.
    pub fn require_backend(&self) -> Result<(&str, &str)> {
        if self.supabase_url.trim().is_empty() || self.anon_key.trim().is_empty() {
            return Err(AppError::Custom(format!(
                "Backend not configured: set supabaseUrl/anonKey in {} or {URL_ENV}/{ANON_KEY_ENV}",
                config_path()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_else(|| "~/.roboscript/config.json".into())
            )));
        }
        Ok((self.supabase_url.trim_end_matches('/'), self.anon_key.as_str()))
    }

    /// `logDir` if set, otherwise `~/.roboscript/logs`.
    pub fn logs_dir(&self) -> Option<PathBuf> {
        match self.log_dir {
            Some(ref dir) => Some(PathBuf::from(expand_tilde(dir))),
            None => base_dir().map(|b| b.join("logs")),
        }
    }
}

pub fn base_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".roboscript"))
}

pub fn config_path() -> Option<PathBuf> {
    base_dir().map(|b| b.join("config.json"))
}

/// Missing or unreadable files yield `None`; callers fall back to defaults.
pub fn load_from(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn load_config() -> AppConfig {
    config_path()
        .and_then(|p| load_from(&p))
        .unwrap_or_default()
        .with_env_overrides()
}

pub fn save_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read-modify-write of the file at `path`.
pub fn update_at(path: &Path, apply: impl FnOnce(&mut AppConfig)) -> Result<AppConfig> {
    let mut config = load_from(path).unwrap_or_default();
    apply(&mut config);
    save_to(path, &config)?;
    Ok(config)
}
