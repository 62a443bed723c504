use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "TELLY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
    pub fetch_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            feed_url: default_feed_url(),
            user_agent: default_user_agent(),
            fetch_timeout: default_fetch_timeout(),
        }
    }
}

fn default_feed_url() -> String {
    "https://raw.githubusercontent.com/efahsl/scrap-tv-feed/refs/heads/main/catalog-fullUrls-720p.json"
        .to_string()
}

fn default_user_agent() -> String {
    "telly/0.1 (+https://github.com/telly-tv/telly)".to_string()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default = "default_mpv_path")]
    pub mpv_path: String,
    #[serde(default = "default_fullscreen")]
    pub fullscreen: bool,
    #[serde(default = "default_prebuffer_timeout", with = "humantime_serde")]
    pub prebuffer_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mpv_path: default_mpv_path(),
            fullscreen: default_fullscreen(),
            prebuffer_timeout: default_prebuffer_timeout(),
        }
    }
}

fn default_mpv_path() -> String {
    "mpv".into()
}

fn default_fullscreen() -> bool {
    true
}

fn default_prebuffer_timeout() -> Duration {
    Duration::from_secs(10)
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
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    if let Some(env_cfg) = load_env(prefix) {
        cfg = merge_config(cfg, env_cfg);
    }

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
    if !other.catalog.feed_url.is_empty() {
        base.catalog.feed_url = other.catalog.feed_url;
    }
    if !other.catalog.user_agent.is_empty() {
        base.catalog.user_agent = other.catalog.user_agent;
    }
    if !other.catalog.fetch_timeout.is_zero() {
        base.catalog.fetch_timeout = other.catalog.fetch_timeout;
    }

    if !other.ui.theme.is_empty() {
        base.ui.theme = other.ui.theme;
    }

    if !other.player.mpv_path.is_empty() {
        base.player.mpv_path = other.player.mpv_path;
    }
    base.player.fullscreen = other.player.fullscreen;
    if !other.player.prebuffer_timeout.is_zero() {
        base.player.prebuffer_timeout = other.player.prebuffer_timeout;
    }

    base
}

fn load_env(prefix: &str) -> Option<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return None;
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Some(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "catalog.feed_url" => cfg.catalog.feed_url = value,
        "catalog.user_agent" => cfg.catalog.user_agent = value,
        "catalog.fetch_timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.catalog.fetch_timeout = duration;
            }
        }
        "ui.theme" => cfg.ui.theme = value,
        "player.mpv_path" => cfg.player.mpv_path = value,
        "player.fullscreen" => {
            cfg.player.fullscreen = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "player.prebuffer_timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.player.prebuffer_timeout = duration;
            }
        }
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("telly").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/telly-config.yaml")),
            env_prefix: Some("TELLY_TEST_NONE".into()),
        })
        .unwrap();
        assert_eq!(cfg.ui.theme, "default");
        assert_eq!(cfg.catalog.feed_url, default_feed_url());
        assert_eq!(cfg.player.mpv_path, "mpv");
        assert_eq!(cfg.player.prebuffer_timeout, Duration::from_secs(10));
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "catalog:\n  feed_url: https://example.test/feed.json\nplayer:\n  mpv_path: /opt/mpv\n  fullscreen: false\n  prebuffer_timeout: 30s"
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(file.path().to_path_buf()),
            env_prefix: Some("TELLY_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.catalog.feed_url, "https://example.test/feed.json");
        assert_eq!(cfg.player.mpv_path, "/opt/mpv");
        assert!(!cfg.player.fullscreen);
        assert_eq!(cfg.player.prebuffer_timeout, Duration::from_secs(30));
    }

    #[test]
    fn env_overrides() {
        env::set_var("TELLY_TEST_ENV_UI__THEME", "dracula");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/telly-config.yaml")),
            env_prefix: Some("TELLY_TEST_ENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.ui.theme, "dracula");
        env::remove_var("TELLY_TEST_ENV_UI__THEME");
    }
}
