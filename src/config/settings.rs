use crate::error::{FetchError, Result};
use crate::fetch::{CacheConfig, CoordinatorConfig, FanoutConfig};
use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub max_workers: usize,
    pub fetch_amount: usize,
    pub follow_amount: usize,
    pub fetch_timeout_ms: Option<u64>,
    pub wait_timeout_ms: Option<u64>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            cache_ttl_secs: 1800,
            cache_capacity: 100,
            max_workers: 5,
            fetch_amount: 20,
            follow_amount: 100,
            fetch_timeout_ms: None,
            wait_timeout_ms: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable lookup; unparsable values are
    /// logged and fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        Config {
            username: lookup("INSTA_USERNAME")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            cache_ttl_secs: parse_var(&lookup, "CACHE_TTL").unwrap_or(defaults.cache_ttl_secs),
            cache_capacity: parse_var(&lookup, "CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            max_workers: parse_var(&lookup, "MAX_WORKERS").unwrap_or(defaults.max_workers),
            fetch_amount: parse_var(&lookup, "FETCH_AMOUNT").unwrap_or(defaults.fetch_amount),
            follow_amount: parse_var(&lookup, "FOLLOW_AMOUNT").unwrap_or(defaults.follow_amount),
            fetch_timeout_ms: parse_var(&lookup, "FETCH_TIMEOUT_MS"),
            wait_timeout_ms: parse_var(&lookup, "WAIT_TIMEOUT_MS"),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(FetchError::Config(
                "INSTA_USERNAME must be provided".to_string(),
            ));
        }
        if self.cache_ttl_secs == 0 {
            return Err(FetchError::Config("CACHE_TTL must be at least 1 second".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(FetchError::Config("CACHE_CAPACITY must be at least 1".to_string()));
        }
        if self.max_workers == 0 {
            return Err(FetchError::Config("MAX_WORKERS must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if let Err(e) = self.validate() {
            log::error!("{}", e);
        }
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache_capacity,
            default_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    pub fn fanout_config(&self) -> FanoutConfig {
        FanoutConfig {
            max_workers: self.max_workers,
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            cache: self.cache_config(),
            fetch_timeout: self.fetch_timeout_ms.map(Duration::from_millis),
            wait_timeout: self.wait_timeout_ms.map(Duration::from_millis),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid number, using the default", name, raw);
            None
        }
    }
}
