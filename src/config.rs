use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::format::Locale;
use crate::tuys;

const DEFAULT_ENV_PREFIX: &str = "TUYS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            token: String::new(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    tuys::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("tuys-tui/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default)]
    pub locale: Locale,
    #[serde(default = "default_show_channel")]
    pub show_channel: bool,
    #[serde(default = "default_notice_ttl", with = "humantime_serde")]
    pub notice_ttl: Duration,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            show_channel: default_show_channel(),
            notice_ttl: default_notice_ttl(),
            log_level: default_log_level(),
        }
    }
}

fn default_show_channel() -> bool {
    true
}

fn default_notice_ttl() -> Duration {
    Duration::from_secs(4)
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if !other.api.token.is_empty() {
        base.api.token = other.api.token;
    }
    if !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }

    base.ui.locale = other.ui.locale;
    base.ui.show_channel = other.ui.show_channel;
    if !other.ui.notice_ttl.is_zero() {
        base.ui.notice_ttl = other.ui.notice_ttl;
    }
    if !other.ui.log_level.is_empty() {
        base.ui.log_level = other.ui.log_level;
    }

    base
}

// Env values are layered directly onto the merged config; unset keys keep
// whatever the file provided.
fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.token" => cfg.api.token = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "ui.locale" => {
            if let Some(locale) = Locale::from_tag(&value) {
                cfg.ui.locale = locale;
            }
        }
        "ui.show_channel" => {
            cfg.ui.show_channel = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "ui.notice_ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.notice_ttl = duration;
            }
        }
        "ui.log_level" => cfg.ui.log_level = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tuys-tui").join("config.yaml"))
}

pub fn log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("tuys-tui").join("tuys-tui.log"))
}
