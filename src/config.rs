use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::assemble::{AssembleOptions, ReplyPolicy};
use crate::loader::LoaderConfig;

const DEFAULT_ENV_PREFIX: &str = "PRISM_FEED";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub loader: LoaderSection,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Site root: an `http(s)://` URL or a local directory.
    #[serde(default = "default_base")]
    pub base: String,
    #[serde(default = "default_content_root")]
    pub content_root: String,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            content_root: default_content_root(),
            manifest_path: default_manifest_path(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base() -> String {
    "public".into()
}

fn default_content_root() -> String {
    "en-US".into()
}

fn default_manifest_path() -> String {
    crate::manifest::DEFAULT_MANIFEST_PATH.into()
}

fn default_user_agent() -> String {
    format!("prism-feed/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderSection {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,
    #[serde(default = "default_fetch_delay", with = "humantime_serde")]
    pub fetch_delay: Duration,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            fetch_delay: default_fetch_delay(),
        }
    }
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_fetch_delay() -> Duration {
    Duration::from_millis(25)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshConfig {
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

fn default_interval() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default)]
    pub reply_policy: ReplyPolicy,
    #[serde(default = "default_generic_groups")]
    pub generic_groups: usize,
    #[serde(default = "default_generic_lines")]
    pub generic_lines: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reply_policy: ReplyPolicy::default(),
            generic_groups: default_generic_groups(),
            generic_lines: default_generic_lines(),
            page_size: default_page_size(),
        }
    }
}

fn default_generic_groups() -> usize {
    1
}

fn default_generic_lines() -> usize {
    2
}

fn default_page_size() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_assets_root")]
    pub assets_root: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            assets_root: default_assets_root(),
        }
    }
}

fn default_assets_root() -> String {
    crate::media::DEFAULT_ASSETS_ROOT.into()
}

impl Config {
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            content_root: self.source.content_root.clone(),
            retries: self.loader.retries,
            retry_delay: self.loader.retry_delay,
            fetch_delay: self.loader.fetch_delay,
        }
    }

    pub fn assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            policy: self.feed.reply_policy,
            max_generic_groups: self.feed.generic_groups,
            max_generic_lines: self.feed.generic_lines,
        }
    }
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
    if !other.source.base.trim().is_empty() {
        base.source.base = other.source.base;
    }
    base.source.content_root = other.source.content_root;
    if !other.source.manifest_path.trim().is_empty() {
        base.source.manifest_path = other.source.manifest_path;
    }
    if !other.source.user_agent.trim().is_empty() {
        base.source.user_agent = other.source.user_agent;
    }
    if !other.source.timeout.is_zero() {
        base.source.timeout = other.source.timeout;
    }

    base.loader = other.loader;

    if !other.refresh.interval.is_zero() {
        base.refresh.interval = other.refresh.interval;
    }

    base.feed.reply_policy = other.feed.reply_policy;
    base.feed.generic_groups = other.feed.generic_groups;
    base.feed.generic_lines = other.feed.generic_lines;
    if other.feed.page_size != 0 {
        base.feed.page_size = other.feed.page_size;
    }

    if !other.media.assets_root.trim().is_empty() {
        base.media.assets_root = other.media.assets_root;
    }

    base
}

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
        "source.base" => cfg.source.base = value,
        "source.content_root" => cfg.source.content_root = value,
        "source.manifest_path" => cfg.source.manifest_path = value,
        "source.user_agent" => cfg.source.user_agent = value,
        "source.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.source.timeout = duration;
            }
        }
        "loader.retries" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.loader.retries = parsed;
            }
        }
        "loader.retry_delay" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.loader.retry_delay = duration;
            }
        }
        "loader.fetch_delay" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.loader.fetch_delay = duration;
            }
        }
        "refresh.interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.refresh.interval = duration;
            }
        }
        "feed.reply_policy" => match value.trim() {
            "both" => cfg.feed.reply_policy = ReplyPolicy::Both,
            "generic_when_no_unique" => cfg.feed.reply_policy = ReplyPolicy::GenericWhenNoUnique,
            _ => {}
        },
        "feed.generic_groups" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.generic_groups = parsed;
            }
        }
        "feed.generic_lines" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.generic_lines = parsed;
            }
        }
        "feed.page_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.page_size = parsed.max(1);
            }
        }
        "media.assets_root" => cfg.media.assets_root = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("prism-feed").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_without_files() {
        let dir = tempdir().unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(dir.path().join("missing.yaml")),
            env_prefix: Some("PRISM_FEED_TEST_DEFAULTS".into()),
        })
        .unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.source.content_root, "en-US");
        assert_eq!(cfg.refresh.interval, Duration::from_secs(10));
        assert_eq!(cfg.assemble_options(), AssembleOptions::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "source:\n  base: https://feed.test/\nloader:\n  retries: 3\n  fetch_delay: 0s\nrefresh:\n  interval: 2s\nfeed:\n  reply_policy: both\n",
        )
        .unwrap();

        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("PRISM_FEED_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.source.base, "https://feed.test/");
        assert_eq!(cfg.source.content_root, "en-US");
        assert_eq!(cfg.loader.retries, 3);
        assert!(cfg.loader.fetch_delay.is_zero());
        assert_eq!(cfg.loader.retry_delay, Duration::from_millis(100));
        assert_eq!(cfg.refresh.interval, Duration::from_secs(2));
        assert_eq!(cfg.feed.reply_policy, ReplyPolicy::Both);
        assert_eq!(cfg.feed.generic_lines, 2);
    }

    #[test]
    fn env_overrides() {
        env::set_var("PRISM_FEED_TEST_ENV_SOURCE__BASE", "/srv/feed");
        env::set_var("PRISM_FEED_TEST_ENV_REFRESH__INTERVAL", "500ms");
        env::set_var("PRISM_FEED_TEST_ENV_FEED__GENERIC_LINES", "4");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/prism-feed.yaml")),
            env_prefix: Some("PRISM_FEED_TEST_ENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.source.base, "/srv/feed");
        assert_eq!(cfg.refresh.interval, Duration::from_millis(500));
        assert_eq!(cfg.loader_config().content_root, "en-US");
        assert_eq!(cfg.assemble_options().max_generic_lines, 4);
        env::remove_var("PRISM_FEED_TEST_ENV_SOURCE__BASE");
        env::remove_var("PRISM_FEED_TEST_ENV_REFRESH__INTERVAL");
        env::remove_var("PRISM_FEED_TEST_ENV_FEED__GENERIC_LINES");
    }
}
