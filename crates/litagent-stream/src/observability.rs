use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_JSON_LOG_FILE: &str = "litagent.logs.jsonl";

/// Logging settings resolved from `LITAGENT_*` environment variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    /// Filter directive; `None` falls back to `RUST_LOG`, then `info`.
    pub level: Option<String>,
    /// When set, logs are written as JSON lines to this file.
    pub json_log_path: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: None,
            json_log_path: None,
        }
    }
}

impl ObservabilityConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ["LITAGENT_OBSERVABILITY_ENABLED", "LITAGENT_OBSERVABILITY"]
            .into_iter()
            .find_map(|key| lookup(key))
            .map(|value| parse_bool(&value).unwrap_or(true))
            .unwrap_or(true);
        let level = lookup("LITAGENT_LOG_LEVEL").filter(|v| !v.trim().is_empty());
        let json_log_path = lookup("LITAGENT_JSON_LOG_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self {
            enabled,
            level,
            json_log_path,
        }
    }

    fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        if let Some(level) = &self.level
            && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
        {
            return filter;
        }
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn split_log_path(path: &Path) -> (&Path, &str) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE);
    (dir, file_name)
}

/// Initializes logging once per process from the environment.
///
/// Console logs go to stderr so stdout stays reserved for generated text.
/// See [`ObservabilityConfig`] for the recognized variables.
pub fn init_observability() {
    init_with(ObservabilityConfig::from_env());
}

/// Initializes logging once per process with explicit settings.
pub fn init_with(config: ObservabilityConfig) {
    INIT.get_or_init(|| {
        if !config.enabled {
            return;
        }

        let env_filter = config.env_filter();
        match &config.json_log_path {
            Some(path) => {
                let (dir, file_name) = split_log_path(path);
                let _ = std::fs::create_dir_all(dir);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            None => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}
