use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use nb_core::LifecycleSettings;
use nb_core::fallback::DEFAULT_PLACEHOLDER_URL;
use nb_core::poll::PollSettings;
use nb_core::relay::MIN_ASSET_BYTES;
use nb_core::retry::BackoffPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub upstream_base_url: String,
    pub default_seed_image: String,
    pub fallback_enabled: bool,
    pub fallback_image_url: String,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
    pub max_submit_attempts: u32,
    pub min_asset_bytes: usize,
    pub batch_concurrency: usize,
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(err).context("failed to read .env file");
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = LifecycleSettings::default();
        let poll_timeout: u64 = parsed(&lookup, "POLL_TIMEOUT_SECS", 120)?;
        let poll_interval: u64 = parsed(&lookup, "POLL_INTERVAL_SECS", 5)?;
        let batch_concurrency: usize = parsed(&lookup, "BATCH_CONCURRENCY", 2)?;

        Ok(Self {
            host: parsed(&lookup, "HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: parsed(&lookup, "PORT", 10000)?,
            upstream_base_url: text(&lookup, "UPSTREAM_BASE_URL", "https://visualgpt.io"),
            default_seed_image: text(&lookup, "DEFAULT_SEED_IMAGE", &defaults.default_seed_image),
            fallback_enabled: flag(&lookup, "FALLBACK_ENABLED", true)?,
            fallback_image_url: text(&lookup, "FALLBACK_IMAGE_URL", DEFAULT_PLACEHOLDER_URL),
            poll_timeout: Duration::from_secs(poll_timeout),
            poll_interval: Duration::from_secs(poll_interval.max(1)),
            max_submit_attempts: parsed(&lookup, "MAX_SUBMIT_ATTEMPTS", 5)?,
            min_asset_bytes: parsed(&lookup, "MIN_ASSET_BYTES", MIN_ASSET_BYTES)?,
            batch_concurrency: batch_concurrency.max(1),
            data_dir: PathBuf::from(text(&lookup, "DATA_DIR", "./data")),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn lifecycle(&self) -> LifecycleSettings {
        LifecycleSettings {
            poll: PollSettings {
                timeout: self.poll_timeout,
                interval: self.poll_interval,
                ..PollSettings::default()
            },
            backoff: BackoffPolicy::default().with_max_attempts(self.max_submit_attempts),
            fallback_enabled: self.fallback_enabled,
            default_seed_image: self.default_seed_image.clone(),
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join("generation_stats.json")
    }
}

fn text(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("{key} has an invalid value {raw:?}: {err}")),
        _ => Ok(default),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> anyhow::Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{key} must be a boolean, got {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.addr().to_string(), "127.0.0.1:10000");
        assert_eq!(config.upstream_base_url, "https://visualgpt.io");
        assert!(config.fallback_enabled);
        assert_eq!(config.poll_timeout, Duration::from_secs(120));
        assert_eq!(config.min_asset_bytes, 1000);
        assert_eq!(config.batch_concurrency, 2);
        assert_eq!(config.stats_path(), PathBuf::from("./data/generation_stats.json"));

        let lifecycle = config.lifecycle();
        assert_eq!(lifecycle, LifecycleSettings::default());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("FALLBACK_ENABLED", "off"),
            ("MAX_SUBMIT_ATTEMPTS", "3"),
            ("POLL_INTERVAL_SECS", "2"),
            ("DATA_DIR", "/var/lib/nb"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert!(!config.fallback_enabled);
        assert_eq!(config.lifecycle().backoff.max_attempts, 3);
        assert_eq!(config.lifecycle().poll.interval, Duration::from_secs(2));
        assert_eq!(config.history_path(), PathBuf::from("/var/lib/nb/history.json"));
    }

    #[test]
    fn test_bad_values_name_the_variable() {
        let err = config(&[("PORT", "ten")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = config(&[("FALLBACK_ENABLED", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("FALLBACK_ENABLED"));
    }
}
