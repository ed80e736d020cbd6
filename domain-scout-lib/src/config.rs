//! Engine configuration: runtime settings, TOML files and environment overrides.
//!
//! Precedence, lowest to highest: built-in defaults, XDG config file, home
//! config file, local config file (or one explicit file), `DS_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::concurrent::BackoffPolicy;
use crate::error::ScoutError;
use crate::types::ProviderId;

/// Maximum names per secondary-check request accepted by the reseller upstream.
pub const MAX_SECONDARY_CHUNK: usize = 30;

/// Settings for the marketplace (session + poll) upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceSettings {
    /// Site root, e.g. `https://www.example-registrar.com`; unset disables the driver
    pub base_url: Option<String>,
    pub currency: String,
}

/// Settings for the reseller (prepare + secondary check) upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ResellerSettings {
    pub base_url: Option<String>,
    pub currency: String,
}

/// Settings for the NIC Chile WHOIS upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct NicChileSettings {
    pub base_url: String,
    /// Published yearly registration rate
    pub registration_price: f64,
    /// Published yearly renewal rate
    pub renewal_price: f64,
    pub currency: String,
}

/// Runtime configuration for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoutConfig {
    /// Bound on every individual network operation
    /// Default: 15 seconds
    pub request_timeout: Duration,

    /// Wall-clock bound on one provider's whole query
    /// Default: 45 seconds
    pub query_budget: Duration,

    /// Polling schedule for asynchronous upstream jobs
    pub backoff: BackoffPolicy,

    /// Delay between consecutive requests of a throttled bulk query
    /// Default: 1 second
    pub throttle_delay: Duration,

    /// Names per secondary-check request (capped at 30)
    pub chunk_size: usize,

    /// Providers queried when the caller does not choose
    pub providers: Vec<ProviderId>,

    pub marketplace: MarketplaceSettings,
    pub reseller: ResellerSettings,
    pub nic_chile: NicChileSettings,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            query_budget: Duration::from_secs(45),
            backoff: BackoffPolicy::default(),
            throttle_delay: Duration::from_secs(1),
            chunk_size: MAX_SECONDARY_CHUNK,
            providers: ProviderId::all(),
            marketplace: MarketplaceSettings {
                base_url: None,
                currency: "USD".to_string(),
            },
            reseller: ResellerSettings {
                base_url: None,
                currency: "USD".to_string(),
            },
            nic_chile: NicChileSettings {
                base_url: "https://www.nic.cl".to_string(),
                registration_price: 9950.0,
                renewal_price: 9950.0,
                currency: "CLP".to_string(),
            },
        }
    }
}

impl ScoutConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_query_budget(mut self, budget: Duration) -> Self {
        self.query_budget = budget;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_throttle_delay(mut self, delay: Duration) -> Self {
        self.throttle_delay = delay;
        self
    }

    /// Set the secondary-check chunk size; clamped to 1..=30.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, MAX_SECONDARY_CHUNK);
        self
    }

    pub fn with_providers(mut self, providers: Vec<ProviderId>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_marketplace_url<U: Into<String>>(mut self, url: U) -> Self {
        self.marketplace.base_url = Some(url.into());
        self
    }

    pub fn with_reseller_url<U: Into<String>>(mut self, url: U) -> Self {
        self.reseller.base_url = Some(url.into());
        self
    }

    pub fn with_nic_chile_url<U: Into<String>>(mut self, url: U) -> Self {
        self.nic_chile.base_url = url.into();
        self
    }
}

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketplace: Option<UpstreamConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reseller: Option<UpstreamConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nic_cl: Option<NicChileConfig>,
}

/// Engine-wide defaults section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// Per-request timeout (e.g. "15s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Per-provider query budget (e.g. "45s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,

    /// Bulk throttle delay (e.g. "1s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle: Option<String>,

    /// Poll schedule (e.g. ["500ms", "1s", "2s"])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
}

/// Section for an upstream whose location is deployment-specific.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpstreamConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NicChileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl FileConfig {
    /// Apply this file's values on top of `config`.
    pub fn apply(&self, mut config: ScoutConfig) -> Result<ScoutConfig, ScoutError> {
        if let Some(defaults) = &self.defaults {
            if let Some(timeout) = &defaults.timeout {
                config.request_timeout = require_duration(timeout)?;
            }
            if let Some(budget) = &defaults.budget {
                config.query_budget = require_duration(budget)?;
            }
            if let Some(throttle) = &defaults.throttle {
                config.throttle_delay = require_duration(throttle)?;
            }
            if let Some(schedule) = &defaults.backoff {
                config.backoff = parse_backoff(schedule)?;
            }
            if let Some(size) = defaults.chunk_size {
                config = config.with_chunk_size(size);
            }
            if let Some(providers) = &defaults.providers {
                config.providers = parse_providers(providers)?;
            }
        }

        if let Some(section) = &self.marketplace {
            if section.base_url.is_some() {
                config.marketplace.base_url = section.base_url.clone();
            }
            if let Some(currency) = &section.currency {
                config.marketplace.currency = currency.clone();
            }
        }

        if let Some(section) = &self.reseller {
            if section.base_url.is_some() {
                config.reseller.base_url = section.base_url.clone();
            }
            if let Some(currency) = &section.currency {
                config.reseller.currency = currency.clone();
            }
        }

        if let Some(section) = &self.nic_cl {
            if let Some(url) = &section.base_url {
                config.nic_chile.base_url = url.clone();
            }
            if let Some(price) = section.registration_price {
                config.nic_chile.registration_price = price;
                // renewal follows registration unless given separately
                config.nic_chile.renewal_price = price;
            }
            if let Some(price) = section.renewal_price {
                config.nic_chile.renewal_price = price;
            }
            if let Some(currency) = &section.currency {
                config.nic_chile.currency = currency.clone();
            }
        }

        Ok(config)
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which config files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ScoutError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScoutError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ScoutError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            ScoutError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    pub fn discover_and_load(&self) -> Result<FileConfig, ScoutError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            let config = self.load_file(&path)?;
            merged_config = self.merge_configs(merged_config, config);
            loaded_files.push(path);
        }

        if self.verbose {
            for path in &loaded_files {
                tracing::info!(path = %path.display(), "loaded configuration file");
            }
        }

        Ok(merged_config)
    }

    /// Local configuration in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./domain-scout.toml", "./.domain-scout.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Configuration in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".domain-scout.toml", "domain-scout.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// XDG Base Directory location.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-scout").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations; values from `higher` win.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower_defaults), Some(higher_defaults)) => Some(DefaultsConfig {
                    timeout: higher_defaults.timeout.or(lower_defaults.timeout),
                    budget: higher_defaults.budget.or(lower_defaults.budget),
                    throttle: higher_defaults.throttle.or(lower_defaults.throttle),
                    backoff: higher_defaults.backoff.or(lower_defaults.backoff),
                    chunk_size: higher_defaults.chunk_size.or(lower_defaults.chunk_size),
                    providers: higher_defaults.providers.or(lower_defaults.providers),
                }),
                (lower_defaults, higher_defaults) => higher_defaults.or(lower_defaults),
            },
            marketplace: merge_upstream(lower.marketplace, higher.marketplace),
            reseller: merge_upstream(lower.reseller, higher.reseller),
            nic_cl: match (lower.nic_cl, higher.nic_cl) {
                (Some(lower_nic), Some(higher_nic)) => Some(NicChileConfig {
                    base_url: higher_nic.base_url.or(lower_nic.base_url),
                    registration_price: higher_nic
                        .registration_price
                        .or(lower_nic.registration_price),
                    renewal_price: higher_nic.renewal_price.or(lower_nic.renewal_price),
                    currency: higher_nic.currency.or(lower_nic.currency),
                }),
                (lower_nic, higher_nic) => higher_nic.or(lower_nic),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), ScoutError> {
        if let Some(defaults) = &config.defaults {
            for value in [&defaults.timeout, &defaults.budget].into_iter().flatten() {
                if require_duration(value)?.is_zero() {
                    return Err(ScoutError::config(format!(
                        "Timeout '{}' must be greater than zero",
                        value
                    )));
                }
            }

            if let Some(throttle) = &defaults.throttle {
                require_duration(throttle)?;
            }

            if let Some(schedule) = &defaults.backoff {
                if schedule.is_empty() {
                    return Err(ScoutError::config("Backoff schedule cannot be empty"));
                }
                parse_backoff(schedule)?;
            }

            if let Some(size) = defaults.chunk_size {
                if size == 0 || size > MAX_SECONDARY_CHUNK {
                    return Err(ScoutError::config(format!(
                        "chunk_size must be between 1 and {}",
                        MAX_SECONDARY_CHUNK
                    )));
                }
            }

            if let Some(providers) = &defaults.providers {
                parse_providers(providers)?;
            }
        }

        if let Some(nic) = &config.nic_cl {
            for price in [nic.registration_price, nic.renewal_price].into_iter().flatten() {
                if price < 0.0 {
                    return Err(ScoutError::config("Prices cannot be negative"));
                }
            }
        }

        Ok(())
    }
}

fn merge_upstream(
    lower: Option<UpstreamConfig>,
    higher: Option<UpstreamConfig>,
) -> Option<UpstreamConfig> {
    match (lower, higher) {
        (Some(lower), Some(higher)) => Some(UpstreamConfig {
            base_url: higher.base_url.or(lower.base_url),
            currency: higher.currency.or(lower.currency),
        }),
        (lower, higher) => higher.or(lower),
    }
}

/// Configuration values set through `DS_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub timeout: Option<Duration>,
    pub budget: Option<Duration>,
    pub throttle: Option<Duration>,
    pub backoff: Option<BackoffPolicy>,
    pub providers: Option<Vec<ProviderId>>,
}

impl EnvConfig {
    /// Apply the environment values on top of `config`.
    pub fn apply(&self, mut config: ScoutConfig) -> ScoutConfig {
        if let Some(timeout) = self.timeout {
            config.request_timeout = timeout;
        }
        if let Some(budget) = self.budget {
            config.query_budget = budget;
        }
        if let Some(throttle) = self.throttle {
            config.throttle_delay = throttle;
        }
        if let Some(backoff) = &self.backoff {
            config.backoff = backoff.clone();
        }
        if let Some(providers) = &self.providers {
            config.providers = providers.clone();
        }
        config
    }
}

/// Load configuration from environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

fn env_config_from<F: Fn(&str) -> Option<String>>(lookup: F) -> EnvConfig {
    let mut config = EnvConfig::default();

    let duration_var = |key: &str| -> Option<Duration> {
        let value = lookup(key)?;
        let parsed = parse_duration_string(&value);
        if parsed.is_none() {
            tracing::warn!(key, value = %value, "ignoring invalid duration");
        }
        parsed
    };

    config.timeout = duration_var("DS_TIMEOUT").filter(|d| !d.is_zero());
    config.budget = duration_var("DS_BUDGET").filter(|d| !d.is_zero());
    config.throttle = duration_var("DS_THROTTLE");

    if let Some(value) = lookup("DS_BACKOFF") {
        let parts: Vec<String> = value.split(',').map(|s| s.trim().to_string()).collect();
        match parse_backoff(&parts) {
            Ok(policy) => config.backoff = Some(policy),
            Err(e) => tracing::warn!(key = "DS_BACKOFF", error = %e, "ignoring invalid backoff"),
        }
    }

    if let Some(value) = lookup("DS_PROVIDERS") {
        let parts: Vec<String> = value.split(',').map(|s| s.trim().to_string()).collect();
        match parse_providers(&parts) {
            Ok(providers) => config.providers = Some(providers),
            Err(e) => tracing::warn!(key = "DS_PROVIDERS", error = %e, "ignoring invalid providers"),
        }
    }

    config
}

/// Parse a duration like "250ms", "5s", "2m", or bare seconds ("10").
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn require_duration(value: &str) -> Result<Duration, ScoutError> {
    parse_duration_string(value).ok_or_else(|| {
        ScoutError::config(format!(
            "Invalid duration '{}'. Use format like '500ms', '5s', '2m'",
            value
        ))
    })
}

fn parse_backoff(schedule: &[String]) -> Result<BackoffPolicy, ScoutError> {
    let delays = schedule
        .iter()
        .map(|s| require_duration(s))
        .collect::<Result<Vec<_>, _>>()?;
    if delays.is_empty() {
        return Err(ScoutError::config("Backoff schedule cannot be empty"));
    }
    Ok(BackoffPolicy::new(delays))
}

fn parse_providers(names: &[String]) -> Result<Vec<ProviderId>, ScoutError> {
    let providers = names
        .iter()
        .map(|name| name.parse::<ProviderId>())
        .collect::<Result<Vec<_>, _>>()?;
    if providers.is_empty() {
        return Err(ScoutError::config("Provider list cannot be empty"));
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_duration_string() {
        assert_eq!(parse_duration_string("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration_string("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration_string("soon"), None);
        assert_eq!(parse_duration_string("5h"), None);
    }

    #[test]
    fn test_parse_duration_minutes_overflow_is_invalid() {
        assert_eq!(parse_duration_string("999999999999999999m"), None);
        assert!(require_duration("999999999999999999m").is_err());
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[defaults]
timeout = "10s"
throttle = "2s"
backoff = ["0ms", "250ms"]
chunk_size = 20
providers = ["nic-cl", "reseller"]

[reseller]
base_url = "https://reseller.test"

[nic_cl]
registration_price = 12000.0
"#
        )
        .unwrap();

        let manager = ConfigManager::new(false);
        let file_config = manager.load_file(file.path()).unwrap();
        let config = file_config.apply(ScoutConfig::default()).unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.throttle_delay, Duration::from_secs(2));
        assert_eq!(config.backoff.max_attempts(), 2);
        assert_eq!(config.chunk_size, 20);
        assert_eq!(config.providers, vec![ProviderId::NicChile, ProviderId::Reseller]);
        assert_eq!(config.reseller.base_url.as_deref(), Some("https://reseller.test"));
        assert_eq!(config.marketplace.base_url, None);
        assert_eq!(config.nic_chile.registration_price, 12000.0);
        assert_eq!(config.nic_chile.renewal_price, 12000.0);
    }

    #[test]
    fn test_invalid_chunk_size() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\nchunk_size = 31").unwrap();

        let result = ConfigManager::new(false).load_file(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_timeout_format() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[defaults]\ntimeout = \"fast\"").unwrap();

        let err = ConfigManager::new(false).load_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid duration 'fast'"));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigManager::new(false)
            .load_file("/nonexistent/domain-scout.toml")
            .unwrap_err();
        assert_eq!(err.kind(), "FileError");
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            defaults: Some(DefaultsConfig {
                timeout: Some("5s".to_string()),
                throttle: Some("1s".to_string()),
                ..Default::default()
            }),
            reseller: Some(UpstreamConfig {
                base_url: Some("https://old.test".to_string()),
                currency: Some("EUR".to_string()),
            }),
            ..Default::default()
        };

        let higher = FileConfig {
            defaults: Some(DefaultsConfig {
                timeout: Some("9s".to_string()),
                ..Default::default()
            }),
            reseller: Some(UpstreamConfig {
                base_url: Some("https://new.test".to_string()),
                currency: None,
            }),
            ..Default::default()
        };

        let merged = manager.merge_configs(lower, higher);
        let defaults = merged.defaults.unwrap();
        assert_eq!(defaults.timeout.as_deref(), Some("9s"));
        assert_eq!(defaults.throttle.as_deref(), Some("1s"));
        let reseller = merged.reseller.unwrap();
        assert_eq!(reseller.base_url.as_deref(), Some("https://new.test"));
        assert_eq!(reseller.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_env_config() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DS_TIMEOUT", "3s"),
            ("DS_THROTTLE", "bogus"),
            ("DS_BACKOFF", "0ms, 100ms, 1s"),
            ("DS_PROVIDERS", "a,c"),
        ]);
        let env = env_config_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(env.timeout, Some(Duration::from_secs(3)));
        assert_eq!(env.throttle, None);
        assert_eq!(env.backoff.as_ref().map(|b| b.max_attempts()), Some(3));

        let config = env.apply(ScoutConfig::default());
        assert_eq!(config.providers, vec![ProviderId::Marketplace, ProviderId::NicChile]);
        assert_eq!(config.throttle_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_chunk_size_clamped() {
        assert_eq!(ScoutConfig::default().with_chunk_size(100).chunk_size, 30);
        assert_eq!(ScoutConfig::default().with_chunk_size(0).chunk_size, 1);
    }
}
