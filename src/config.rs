// src/config.rs
//! Service configuration: TOML file with per-field defaults, then env overrides.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/feed.toml";
pub const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const ENV_API_KEY: &str = "YOUTUBE_API_KEY";
pub const ENV_MIN_DURATION: &str = "MIN_DURATION_SECS";

/// Upper bound imposed by `videos.list`.
pub const MAX_BATCH_SIZE: usize = 50;
/// 30 days.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 2_592_000;
pub const DEFAULT_MIN_DURATION_SECS: u64 = 180;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub feed: FeedConfig,
    pub resolver: ResolverConfig,
    pub cache: CacheConfig,
    pub filter: FilterConfig,
    pub enrich: EnrichConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `max-age` advertised on successful feed responses.
    pub response_max_age_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            response_max_age_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub upstream_url: String,
    pub fetch_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            upstream_url: "https://www.youtube.com/feeds/videos.xml".to_string(),
            fetch_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub api_base: String,
    /// "ENV" means: read from YOUTUBE_API_KEY. Empty disables resolution.
    pub api_key: String,
    pub batch_size: usize,
    pub max_pages: usize,
    pub call_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            api_key: "ENV".to_string(),
            batch_size: MAX_BATCH_SIZE,
            max_pages: 10,
            call_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub dir: PathBuf,
    pub ttl_secs: u64,
    pub provider_prefix: String,
    pub op_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            dir: PathBuf::from("cache/durations"),
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            provider_prefix: "youtube".to_string(),
            op_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_duration_secs: u64,
    pub drop_shorts_tag: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: DEFAULT_MIN_DURATION_SECS,
            drop_shorts_tag: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub max_concurrency: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self { max_concurrency: 16 }
    }
}

impl AppConfig {
    /// Load config from an explicit TOML file, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load config using env var + fallbacks:
    /// 1) $FEED_CONFIG_PATH (must exist)
    /// 2) config/feed.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing config toml")?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if self.resolver.api_key.trim().eq_ignore_ascii_case("env") {
            self.resolver.api_key = std::env::var(ENV_API_KEY).unwrap_or_default();
        }
        if let Ok(raw) = std::env::var(ENV_MIN_DURATION) {
            self.filter.min_duration_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MIN_DURATION} must be whole seconds"))?;
        }
        self.sanitize();
        Ok(())
    }

    fn sanitize(&mut self) {
        self.resolver.batch_size = self.resolver.batch_size.clamp(1, MAX_BATCH_SIZE);
        self.resolver.max_pages = self.resolver.max_pages.max(1);
        self.enrich.max_concurrency = self.enrich.max_concurrency.max(1);
        self.cache.provider_prefix = self.cache.provider_prefix.trim().to_string();
        if self.cache.provider_prefix.is_empty() {
            self.cache.provider_prefix = "youtube".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[serial_test::serial]
    #[test]
    fn defaults_fill_missing_sections() {
        env::remove_var(ENV_MIN_DURATION);
        env::set_var(ENV_API_KEY, "k-123");
        let cfg = AppConfig::from_toml_str("[filter]\ndrop_shorts_tag = true\n").unwrap();
        assert_eq!(cfg.filter.min_duration_secs, 180);
        assert!(cfg.filter.drop_shorts_tag);
        assert_eq!(cfg.cache.ttl_secs, 2_592_000);
        assert_eq!(cfg.cache.backend, CacheBackend::Memory);
        assert_eq!(cfg.resolver.batch_size, 50);
        assert_eq!(cfg.resolver.api_key, "k-123");
        env::remove_var(ENV_API_KEY);
    }

    #[serial_test::serial]
    #[test]
    fn batch_size_is_clamped_and_env_overrides_threshold() {
        env::set_var(ENV_MIN_DURATION, "240");
        let cfg = AppConfig::from_toml_str(
            r#"
[resolver]
api_key = "literal"
batch_size = 500
max_pages = 0

[cache]
backend = "file"
provider_prefix = "  "
"#,
        )
        .unwrap();
        env::remove_var(ENV_MIN_DURATION);

        assert_eq!(cfg.resolver.batch_size, MAX_BATCH_SIZE);
        assert_eq!(cfg.resolver.max_pages, 1);
        assert_eq!(cfg.resolver.api_key, "literal");
        assert_eq!(cfg.cache.backend, CacheBackend::File);
        assert_eq!(cfg.cache.provider_prefix, "youtube");
        assert_eq!(cfg.filter.min_duration_secs, 240);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD so the repo's own config/ is not picked up
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_MIN_DURATION);

        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.server.response_max_age_secs, 3600);

        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[server]\nresponse_max_age_secs = 60\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.server.response_max_age_secs, 60);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(AppConfig::load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
