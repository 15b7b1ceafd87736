//! Configuration Loader
//!
//! Environment-aware loading on top of the `config` crate. A base TOML file is
//! optionally overlaid by `<stem>.<environment>.toml` next to it, and finally by
//! `ETL_`-prefixed environment variables (`ETL_POLLING__INTERVAL_MS=500`).

use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::OrchestratorConfig;
use crate::error::ConfigurationError;

/// Config file read when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "config/orchestrator.toml";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "ETL";

/// Loaded configuration together with where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: OrchestratorConfig,
    environment: String,
    config_file: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    ///
    /// An explicit `config_file` must exist; the default location is optional.
    pub fn load(config_file: Option<PathBuf>) -> Result<Self, ConfigurationError> {
        let environment = detect_environment();
        Self::load_with_env(config_file, &environment, None)
    }

    /// Load with an explicit environment name and, for tests, an explicit set
    /// of environment variables instead of the process environment
    pub fn load_with_env(
        config_file: Option<PathBuf>,
        environment: &str,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let required = config_file.is_some();
        let config_file = config_file.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let overlay = environment_overlay_path(&config_file, environment);

        debug!(
            config_file = %config_file.display(),
            overlay = %overlay.display(),
            environment = %environment,
            "Loading orchestrator configuration"
        );

        let config: OrchestratorConfig = Config::builder()
            .add_source(Config::try_from(&OrchestratorConfig::default())?)
            .add_source(File::from(config_file.as_path()).required(required))
            .add_source(File::from(overlay.as_path()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env_vars),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = %environment,
            base_url = %config.backend.base_url,
            interval_ms = config.polling.interval_ms,
            max_ticks = ?config.polling.max_ticks,
            "Configuration loaded successfully"
        );

        Ok(Self {
            config,
            environment: environment.to_string(),
            config_file,
        })
    }

    /// Wrap an already-built configuration (validated)
    pub fn from_config(config: OrchestratorConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            environment: detect_environment(),
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn into_config(self) -> OrchestratorConfig {
        self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Configuration as JSON with credentials masked, safe to print or log
    pub fn debug_config(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(&self.config).unwrap_or_default();
        sanitize_json_recursive(&mut value, &["token", "key", "secret", "password"]);
        value
    }
}

/// Detect current environment: ETL_ENV || APP_ENV || 'development'
pub fn detect_environment() -> String {
    env::var("ETL_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

/// `config/orchestrator.toml` + `production` -> `config/orchestrator.production.toml`
fn environment_overlay_path(config_file: &Path, environment: &str) -> PathBuf {
    let stem = config_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("orchestrator");
    let extension = config_file
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("toml");
    config_file.with_file_name(format!("{stem}.{environment}.{extension}"))
}

fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                // Header names are not secrets
                let is_sensitive = !key_lower.ends_with("_header")
                    && sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                if is_sensitive {
                    if let serde_json::Value::String(s) = val {
                        let chars: Vec<char> = s.chars().collect();
                        let masked = if chars.len() > 4 {
                            let head: String = chars[..2].iter().collect();
                            let tail: String = chars[chars.len() - 2..].iter().collect();
                            format!("{head}***{tail}")
                        } else {
                            "***".to_string()
                        };
                        *val = serde_json::Value::String(format!("[MASKED: {masked}]"));
                    }
                } else {
                    sanitize_json_recursive(val, sensitive_patterns);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                sanitize_json_recursive(item, sensitive_patterns);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_explicit_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        // An explicit file must exist
        assert!(ConfigManager::load_with_env(Some(missing), "test", Some(HashMap::new())).is_err());
    }

    #[test]
    fn test_file_and_environment_overlay() {
        let dir = TempDir::new().unwrap();
        let base = write_file(
            &dir,
            "orchestrator.toml",
            r#"
[backend]
base_url = "http://etl-backend:5000"
timeout_ms = 10000

[polling]
interval_ms = 2000
"#,
        );
        write_file(
            &dir,
            "orchestrator.production.toml",
            r#"
[polling]
interval_ms = 1500
max_ticks = 120
"#,
        );

        let manager =
            ConfigManager::load_with_env(Some(base), "production", Some(HashMap::new())).unwrap();
        let config = manager.config();
        assert_eq!(config.backend.base_url, "http://etl-backend:5000");
        assert_eq!(config.backend.timeout_ms, 10000);
        assert_eq!(config.polling.interval_ms, 1500);
        assert_eq!(config.polling.max_ticks, Some(120));
        // Untouched values keep their defaults
        assert_eq!(config.polling.dependent_stage_floor, 10);
        assert_eq!(manager.environment(), "production");
    }

    #[test]
    fn test_environment_variables_take_precedence() {
        let dir = TempDir::new().unwrap();
        let base = write_file(&dir, "orchestrator.toml", "[polling]\ninterval_ms = 2000\n");

        let mut vars = HashMap::new();
        vars.insert("ETL_POLLING__INTERVAL_MS".to_string(), "250".to_string());
        vars.insert(
            "ETL_LAUNCH__REQUIRE_DATA_SOURCES".to_string(),
            "true".to_string(),
        );

        let manager = ConfigManager::load_with_env(Some(base), "test", Some(vars)).unwrap();
        assert_eq!(manager.config().polling.interval_ms, 250);
        assert!(manager.config().launch.require_data_sources);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let base = write_file(&dir, "orchestrator.toml", "[polling]\ninterval_ms = 0\n");
        let err = ConfigManager::load_with_env(Some(base), "test", Some(HashMap::new()))
            .unwrap_err();
        assert!(err.to_string().contains("polling.interval_ms"));
    }

    #[test]
    fn test_overlay_path() {
        assert_eq!(
            environment_overlay_path(Path::new("config/orchestrator.toml"), "test"),
            PathBuf::from("config/orchestrator.test.toml")
        );
    }

    #[test]
    fn test_debug_config_masks_credentials() {
        let mut config = OrchestratorConfig::default();
        config.backend.bearer_token = Some("abcdef123456".to_string());
        let manager = ConfigManager::from_config(config).unwrap();

        let rendered = manager.debug_config();
        assert_eq!(rendered["backend"]["bearer_token"], "[MASKED: ab***56]");
        assert_eq!(rendered["backend"]["api_key_header"], "X-API-Key");
    }
}
