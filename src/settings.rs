//! Layered runtime settings.
//!
//! Values are resolved from, lowest to highest precedence: built-in defaults,
//! an optional TOML file, and `SCATTER_*` environment variables. The CLI
//! applies its own flags on top.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scatter_core::{TraceSettings, DEFAULT_TIMELINE_LINK};

/// Environment variable prefix, e.g. `SCATTER_REGION`.
pub const ENV_PREFIX: &str = "SCATTER";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the graph and trace data service.
    pub endpoint: String,
    pub region: String,
    /// Lifetime of cached window snapshots.
    pub cache_ttl_secs: u64,
    /// Trace lookups keep at most this many trailing seconds.
    pub maximum_trace_range_secs: i64,
    /// Workers per aggregation when no shared pool is configured.
    pub window_threads: usize,
    /// Enable a process-wide pool of this size for all aggregations.
    pub shared_pool_size: Option<usize>,
    pub retry_limit: u32,
    pub request_timeout_secs: u64,
    pub retry_backoff_ms: u64,
    /// Template with `{region}` and `{trace_id}` placeholders.
    pub timeline_link: String,
    pub trace_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:2000".to_string(),
            region: "us-east-1".to_string(),
            cache_ttl_secs: 7 * 24 * 3600,
            maximum_trace_range_secs: 6 * 24 * 3600,
            window_threads: 6,
            shared_pool_size: None,
            retry_limit: 6,
            request_timeout_secs: 10,
            retry_backoff_ms: 200,
            timeline_link: DEFAULT_TIMELINE_LINK.to_string(),
            trace_limit: 100,
        }
    }
}

impl Settings {
    /// Load defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load), reading variables from `env` instead of the
    /// process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |key, reason: &str| {
            Err(SettingsError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };

        if self.window_threads == 0 {
            return invalid("window_threads", "must be at least 1");
        }
        if self.shared_pool_size == Some(0) {
            return invalid("shared_pool_size", "must be at least 1");
        }
        if self.maximum_trace_range_secs <= 0 {
            return invalid("maximum_trace_range_secs", "must be positive");
        }
        if self.endpoint.is_empty() {
            return invalid("endpoint", "must not be empty");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn trace_settings(&self) -> TraceSettings {
        TraceSettings {
            maximum_range: self.maximum_trace_range_secs,
            limit: self.trace_limit,
            timeline_link: self.timeline_link.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(vars: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_with_env(None, env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cache_ttl(), Duration::from_secs(604_800));
        assert_eq!(settings.trace_settings().maximum_range, 518_400);
        assert_eq!(settings.window_threads, 6);
        assert_eq!(settings.shared_pool_size, None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
region = "eu-west-1"
window_threads = 3
shared_pool_size = 20
"#
        )
        .unwrap();

        let settings = Settings::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.window_threads, 3);
        assert_eq!(settings.shared_pool_size, Some(20));
        assert_eq!(settings.retry_limit, 6);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"region = "eu-west-1""#).unwrap();

        let settings = Settings::load_with_env(
            Some(file.path()),
            env(&[
                ("SCATTER_REGION", "ap-south-1"),
                ("SCATTER_RETRY_LIMIT", "2"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.region, "ap-south-1");
        assert_eq!(settings.retry_limit, 2);
    }

    #[test]
    fn test_env_keys_keep_inner_underscores() {
        let settings = Settings::load_with_env(
            None,
            env(&[
                ("SCATTER_SHARED_POOL_SIZE", "12"),
                ("SCATTER_CACHE_TTL_SECS", "60"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.shared_pool_size, Some(12));
        assert_eq!(settings.cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_requires_prefix() {
        let settings =
            Settings::load_with_env(None, env(&[("REGION", "ap-south-1")])).unwrap();
        assert_eq!(settings.region, "us-east-1");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Settings::load_with_env(Some(Path::new("/nonexistent/scatter.toml")), env(&[]));
        assert!(matches!(result, Err(SettingsError::Load(_))));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = Settings::load_with_env(None, env(&[("SCATTER_WINDOW_THREADS", "0")]));
        assert!(matches!(
            result,
            Err(SettingsError::Invalid {
                key: "window_threads",
                ..
            })
        ));
    }

    #[test]
    fn test_timeline_link_template() {
        let settings = Settings::default();
        assert_eq!(
            settings.trace_settings().timeline_link("us-east-1", "1-abc-def"),
            "https://console.aws.amazon.com/xray/home?region=us-east-1#/traces/1-abc-def"
        );
    }
}
