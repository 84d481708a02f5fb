//! Layered process configuration.
//!
//! Values are merged from, lowest to highest priority: built-in defaults, the
//! YAML file named by `CALLSIM_CONFIG_PATH` (default `config/config.yaml`),
//! then `CALLSIM_`-prefixed environment variables using `__` to reach nested
//! keys, e.g. `CALLSIM_PUSH__WORKERS=8`.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use callsim_delivery::{ClientConfig, RetryPolicy, DEFAULT_MAX_FILE_BYTES};
use callsim_simulator::{AccountProfile, DriverConfig, SimulatorConfig};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Environment variable naming the YAML file.
pub const CONFIG_PATH_ENV: &str = "CALLSIM_CONFIG_PATH";

/// YAML file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Complete process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Collector endpoints and pool size.
    #[serde(default)]
    pub push: PushConfig,

    /// Account attribution for generated records.
    #[serde(default)]
    pub account: AccountConfig,

    /// Retry schedule.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Driver tick periods.
    #[serde(default)]
    pub interval: IntervalConfig,

    /// Health endpoint.
    #[serde(default)]
    pub health: HealthConfig,

    /// HTTP client behaviour.
    #[serde(default)]
    pub delivery: DeliverySettings,

    /// Outcome log files.
    #[serde(default)]
    pub log: LogConfig,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
}

/// Collector endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Endpoint receiving CDRs.
    #[serde(default)]
    pub cdr_url: String,

    /// Endpoint receiving call status events.
    #[serde(default)]
    pub status_url: String,

    /// Worker count of each delivery pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Account records are attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account identifier.
    #[serde(default)]
    pub id: String,

    /// Service type code.
    #[serde(default = "default_service_type")]
    pub service_type: i32,
}

/// Attempt count and per-attempt delays in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per record.
    #[serde(default = "default_retry_times")]
    pub times: u32,

    /// Seconds to wait before each attempt; the first entry is never slept.
    #[serde(default = "default_retry_delays")]
    pub delays: Vec<u64>,
}

/// Milliseconds between driver ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// CDR ticker period.
    #[serde(default = "default_cdr_interval")]
    pub cdr: u64,

    /// Advance ticker period.
    #[serde(default = "default_status_interval")]
    pub status: u64,

    /// New-call ticker period.
    #[serde(default = "default_new_call_interval")]
    pub new_call: u64,
}

/// Health endpoint binding and cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Bind host.
    #[serde(default = "default_health_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_health_port")]
    pub port: u16,

    /// Seconds a health result is reused.
    #[serde(default = "default_cache_seconds")]
    pub cache_seconds: u64,
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// Per-request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// `User-Agent` header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Time allowed for each pool to drain on shutdown.
    #[serde(default = "default_shutdown_timeout_seconds")]
    pub shutdown_timeout_seconds: u64,
}

/// Outcome log location and rotation size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory holding the log files.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Size after which a file is rotated.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Config {
    /// Loads configuration from the default file location and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider can not be parsed or the merged values
    /// fail validation.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(path)
    }

    /// Loads configuration using `path` as the YAML layer.
    ///
    /// A missing file contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider can not be parsed or the merged values
    /// fail validation.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("CALLSIM_").split("__").ignore(&["config_path"]))
            .extract()
            .context("Failed to load configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        validate_endpoint("push.cdr_url", &self.push.cdr_url)?;
        validate_endpoint("push.status_url", &self.push.status_url)?;
        if self.account.id.is_empty() {
            bail!("account.id must be set");
        }
        if self.push.workers == 0 {
            bail!("push.workers must be at least 1");
        }
        if self.retry.times == 0 {
            bail!("retry.times must be at least 1");
        }
        if self.retry.delays.len() < self.retry.times as usize {
            bail!(
                "retry.delays has {} entries but retry.times is {}",
                self.retry.delays.len(),
                self.retry.times
            );
        }
        if self.interval.cdr == 0 || self.interval.status == 0 || self.interval.new_call == 0 {
            bail!("interval values must be greater than zero");
        }
        if self.health.port == 0 {
            bail!("health.port must be greater than zero");
        }
        Ok(())
    }

    /// Retry schedule for both services.
    ///
    /// # Errors
    ///
    /// Returns an error if the schedule does not cover every attempt.
    pub fn to_retry_policy(&self) -> Result<RetryPolicy> {
        let delays = self.retry.delays.iter().copied().map(Duration::from_secs).collect();
        RetryPolicy::new(self.retry.times, delays).context("Invalid retry configuration")
    }

    /// HTTP client settings.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.delivery.timeout_seconds),
            user_agent: self.delivery.user_agent.clone(),
        }
    }

    /// Settings for the simulation services.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry schedule is invalid.
    pub fn to_simulator_config(&self) -> Result<SimulatorConfig> {
        Ok(SimulatorConfig {
            account: AccountProfile {
                account_id: self.account.id.clone(),
                service_type: self.account.service_type,
            },
            cdr_url: self.push.cdr_url.clone(),
            status_url: self.push.status_url.clone(),
            workers: self.push.workers,
            retry_policy: self.to_retry_policy()?,
            shutdown_timeout: self.shutdown_timeout(),
        })
    }

    /// Ticker layout derived from the worker count and intervals.
    pub fn to_driver_config(&self) -> DriverConfig {
        DriverConfig::for_workers(
            self.push.workers,
            Duration::from_millis(self.interval.cdr),
            Duration::from_millis(self.interval.status),
            Duration::from_millis(self.interval.new_call),
        )
    }

    /// Health endpoint bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn health_addr(&self) -> Result<SocketAddr> {
        parse_socket_addr(&self.health.host, self.health.port)
    }

    /// Health cache lifetime.
    pub fn health_cache(&self) -> Duration {
        Duration::from_secs(self.health.cache_seconds)
    }

    /// Pool drain timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery.shutdown_timeout_seconds)
    }
}

fn validate_endpoint(key: &str, url: &str) -> Result<()> {
    if url.is_empty() {
        bail!("{key} must be set");
    }
    let parsed = Url::parse(url).with_context(|| format!("{key} is not a valid URL: {url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("{key} must use http or https: {url}");
    }
    Ok(())
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    SocketAddr::from_str(&format!("{host}:{port}"))
        .with_context(|| format!("Invalid health address: {host}:{port}"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            push: PushConfig::default(),
            account: AccountConfig::default(),
            retry: RetryConfig::default(),
            interval: IntervalConfig::default(),
            health: HealthConfig::default(),
            delivery: DeliverySettings::default(),
            log: LogConfig::default(),
            rust_log: default_rust_log(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { cdr_url: String::new(), status_url: String::new(), workers: default_workers() }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self { id: String::new(), service_type: default_service_type() }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { times: default_retry_times(), delays: default_retry_delays() }
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            cdr: default_cdr_interval(),
            status: default_status_interval(),
            new_call: default_new_call_interval(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: default_health_host(),
            port: default_health_port(),
            cache_seconds: default_cache_seconds(),
        }
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
            shutdown_timeout_seconds: default_shutdown_timeout_seconds(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: default_log_dir(), max_file_bytes: default_max_file_bytes() }
    }
}

fn default_rust_log() -> String {
    "info".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_service_type() -> i32 {
    1
}

fn default_retry_times() -> u32 {
    3
}

fn default_retry_delays() -> Vec<u64> {
    vec![0, 1, 2]
}

fn default_cdr_interval() -> u64 {
    100
}

fn default_status_interval() -> u64 {
    50
}

fn default_new_call_interval() -> u64 {
    100
}

fn default_health_host() -> String {
    "0.0.0.0".to_string()
}

fn default_health_port() -> u16 {
    9090
}

fn default_cache_seconds() -> u64 {
    5
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    ClientConfig::default().user_agent
}

fn default_shutdown_timeout_seconds() -> u64 {
    callsim_delivery::DEFAULT_SHUTDOWN_TIMEOUT_SECONDS
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        io::Write,
        sync::{Mutex, MutexGuard, PoisonError},
    };

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct TestEnvGuard {
        _lock: MutexGuard<'static, ()>,
        originals: HashMap<String, Option<String>>,
    }

    impl TestEnvGuard {
        fn new() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let mut guard = Self { _lock: lock, originals: HashMap::new() };
            let keys: Vec<String> =
                env::vars().map(|(key, _)| key).filter(|key| key.starts_with("CALLSIM_")).collect();
            for key in keys {
                guard.remove(&key);
            }
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            self.originals.entry(key.to_string()).or_insert_with(|| env::var(key).ok());
            env::set_var(key, value);
        }

        fn remove(&mut self, key: &str) {
            self.originals.entry(key.to_string()).or_insert_with(|| env::var(key).ok());
            env::remove_var(key);
        }
    }

    impl Drop for TestEnvGuard {
        fn drop(&mut self) {
            for (key, original) in &self.originals {
                match original {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }

    const MINIMAL_YAML: &str = "\
push:
  cdr_url: http://collector/cdr
  status_url: http://collector/status
account:
  id: acct-1
";

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn valid() -> Config {
        let mut config = Config::default();
        config.push.cdr_url = "http://collector/cdr".to_string();
        config.push.status_url = "http://collector/status".to_string();
        config.account.id = "acct-1".to_string();
        config
    }

    #[test]
    fn defaults_fill_everything_but_endpoints_and_account() {
        let _env = TestEnvGuard::new();
        let file = yaml_file(MINIMAL_YAML);

        let config = Config::load_from(file.path()).unwrap();

        assert_eq!(config.push.workers, 4);
        assert_eq!(config.account.service_type, 1);
        assert_eq!(config.retry.times, 3);
        assert_eq!(config.retry.delays, vec![0, 1, 2]);
        assert_eq!(config.interval, IntervalConfig { cdr: 100, status: 50, new_call: 100 });
        assert_eq!(config.health.port, 9090);
        assert_eq!(config.log.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn default_config_keeps_serde_defaults() {
        let config = Config::default();

        assert_eq!(config.rust_log, "info");
        assert_eq!(config.push.workers, 4);
        assert_eq!(config.health.port, 9090);
    }

    #[test]
    fn missing_file_without_endpoints_is_rejected() {
        let _env = TestEnvGuard::new();

        let error = Config::load_from("/nonexistent/callsim.yaml").unwrap_err();

        assert!(error.to_string().contains("push.cdr_url"), "unexpected error: {error}");
    }

    #[test]
    fn file_values_override_defaults() {
        let _env = TestEnvGuard::new();
        let file = yaml_file(
            "\
push:
  cdr_url: http://collector/cdr
  status_url: http://collector/status
  workers: 2
account:
  id: acct-9
  service_type: 5
retry:
  times: 2
  delays: [0, 10]
interval:
  cdr: 1000
health:
  port: 8088
",
        );

        let config = Config::load_from(file.path()).unwrap();

        assert_eq!(config.push.workers, 2);
        assert_eq!(config.account.id, "acct-9");
        assert_eq!(config.account.service_type, 5);
        assert_eq!(config.retry.delays, vec![0, 10]);
        assert_eq!(config.interval.cdr, 1000);
        assert_eq!(config.interval.status, 50);
        assert_eq!(config.health.port, 8088);
    }

    #[test]
    fn environment_overrides_file() {
        let mut env = TestEnvGuard::new();
        let file = yaml_file(MINIMAL_YAML);
        env.set("CALLSIM_PUSH__WORKERS", "8");
        env.set("CALLSIM_ACCOUNT__ID", "from-env");

        let config = Config::load_from(file.path()).unwrap();

        assert_eq!(config.push.workers, 8);
        assert_eq!(config.account.id, "from-env");
        assert_eq!(config.push.cdr_url, "http://collector/cdr");
    }

    #[test]
    fn load_reads_path_from_environment() {
        let mut env = TestEnvGuard::new();
        let file = yaml_file(MINIMAL_YAML);
        env.set(CONFIG_PATH_ENV, &file.path().display().to_string());

        let config = Config::load().unwrap();

        assert_eq!(config.account.id, "acct-1");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cases: Vec<(&str, fn(&mut Config))> = vec![
            ("status_url", |c: &mut Config| c.push.status_url.clear()),
            ("push.cdr_url is not a valid URL", |c: &mut Config| {
                c.push.cdr_url = "not a url".to_string()
            }),
            ("push.status_url is not a valid URL", |c: &mut Config| {
                c.push.status_url = "ftp//nope".to_string()
            }),
            ("must use http or https", |c: &mut Config| {
                c.push.cdr_url = "ftp://collector/cdr".to_string()
            }),
            ("account.id", |c: &mut Config| c.account.id.clear()),
            ("workers", |c: &mut Config| c.push.workers = 0),
            ("retry.times", |c: &mut Config| c.retry.times = 0),
            ("retry.delays", |c: &mut Config| c.retry.delays = vec![0, 1]),
            ("interval", |c: &mut Config| c.interval.status = 0),
            ("health.port", |c: &mut Config| c.health.port = 0),
        ];

        for (expected, mutate) in cases {
            let mut config = valid();
            mutate(&mut config);
            let error = config.validate().unwrap_err();
            assert!(error.to_string().contains(expected), "{expected}: got {error}");
        }
    }

    #[test]
    fn longer_delay_schedule_is_accepted() {
        let mut config = valid();
        config.retry.delays = vec![0, 1, 2, 4, 8];

        assert!(config.validate().is_ok());
        assert_eq!(config.to_retry_policy().unwrap().delays().len(), 5);
    }

    #[test]
    fn conversions_carry_settings() {
        let config = valid();

        let policy = config.to_retry_policy().unwrap();
        assert_eq!(policy.times(), 3);
        assert_eq!(policy.delay_before(2), Duration::from_secs(2));

        let simulator = config.to_simulator_config().unwrap();
        assert_eq!(simulator.account.account_id, "acct-1");
        assert_eq!(simulator.workers, 4);
        assert_eq!(simulator.shutdown_timeout, Duration::from_secs(30));

        let driver = config.to_driver_config();
        assert_eq!(driver.cdr_tickers, 4);
        assert_eq!(driver.advance_tickers, 8);
        assert_eq!(driver.status_interval, Duration::from_millis(50));

        assert_eq!(config.to_client_config().timeout, Duration::from_secs(30));
        assert_eq!(config.health_addr().unwrap(), "0.0.0.0:9090".parse().unwrap());
    }

    #[test]
    fn invalid_health_host_is_reported() {
        let mut config = valid();
        config.health.host = "not a host".to_string();

        assert!(config.health_addr().is_err());
    }
}
