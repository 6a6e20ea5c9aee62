use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context as _;
use litagent_stream::HttpConfig;

pub const BASE_URL_ENV: &str = "LITAGENT_BASE_URL";
pub const TIMEOUT_ENV: &str = "LITAGENT_TIMEOUT_SECS";

/// Loads `.env` files: the crate-local one first, then the working directory.
pub fn init() {
    let _ = dotenvy::from_path(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/.env")));
    dotenvy::dotenv().ok();
}

/// Connection settings after merging environment and command-line flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Settings {
    /// Flags win over environment values, which win over defaults.
    pub fn resolve(
        base_url_flag: Option<String>,
        timeout_flag: Option<u64>,
    ) -> anyhow::Result<Self> {
        Self::resolve_with(base_url_flag, timeout_flag, |key| std::env::var(key).ok())
    }

    fn resolve_with(
        base_url_flag: Option<String>,
        timeout_flag: Option<u64>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let base_url = match base_url_flag {
            Some(url) => url,
            None => lookup(BASE_URL_ENV)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| HttpConfig::default().base_url),
        };
        let timeout_secs = match timeout_flag {
            Some(secs) => Some(secs),
            None => parse_env::<u64>(&lookup, TIMEOUT_ENV)?,
        };
        Ok(Self {
            base_url,
            timeout: timeout_secs.filter(|s| *s > 0).map(Duration::from_secs),
        })
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::new(self.base_url.clone())
    }
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(None),
    }
}
