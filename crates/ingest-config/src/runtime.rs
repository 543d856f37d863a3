//! Process-wide runtime configuration: compiled-in defaults, overridden by
//! an optional TOML file, overridden by `INGEST_`-prefixed environment
//! variables. Distinct from the per-table `_config/` resolver in
//! [`crate::resolver`], which resolves data-path configuration instead of
//! process configuration.

use std::env;

use serde::Deserialize;

use ingest_core::path::DEFAULT_DESTINATION_REGEX;

const ENV_PREFIX: &str = "INGEST_";
const CONFIG_PATH_ENV: &str = "INGEST_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./ingest.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_destination_regex")]
    pub destination_regex: String,
    #[serde(default = "default_success_filename")]
    pub success_filename: String,
    #[serde(default)]
    pub start_backfill_filename: Option<String>,
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: u64,
    #[serde(default = "default_wait_for_job_secs")]
    pub wait_for_job_secs: u64,
    #[serde(default = "default_job_poll_interval_secs")]
    pub job_poll_interval_secs: u64,
    #[serde(default = "default_restart_buffer_secs")]
    pub restart_buffer_secs: u64,
    #[serde(default = "default_ensure_subscriber_secs")]
    pub ensure_subscriber_secs: u64,
    #[serde(default)]
    pub order_all_jobs: bool,
    #[serde(default = "default_job_prefix")]
    pub job_prefix: String,
    #[serde(default = "default_function_timeout_secs")]
    pub function_timeout_secs: u64,
    #[serde(default)]
    pub warehouse_project: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
}

fn default_destination_regex() -> String {
    DEFAULT_DESTINATION_REGEX.to_string()
}
fn default_success_filename() -> String {
    "_SUCCESS".to_string()
}
fn default_max_batch_bytes() -> u64 {
    15_000_000_000_000
}
fn default_wait_for_job_secs() -> u64 {
    5
}
fn default_job_poll_interval_secs() -> u64 {
    1
}
fn default_restart_buffer_secs() -> u64 {
    30
}
fn default_ensure_subscriber_secs() -> u64 {
    30
}
fn default_job_prefix() -> String {
    "gcf-ingest-".to_string()
}
fn default_function_timeout_secs() -> u64 {
    60
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            destination_regex: default_destination_regex(),
            success_filename: default_success_filename(),
            start_backfill_filename: None,
            max_batch_bytes: default_max_batch_bytes(),
            wait_for_job_secs: default_wait_for_job_secs(),
            job_poll_interval_secs: default_job_poll_interval_secs(),
            restart_buffer_secs: default_restart_buffer_secs(),
            ensure_subscriber_secs: default_ensure_subscriber_secs(),
            order_all_jobs: false,
            job_prefix: default_job_prefix(),
            function_timeout_secs: default_function_timeout_secs(),
            warehouse_project: None,
            bucket: None,
        }
    }
}

impl RuntimeConfig {
    /// Loads defaults, then an optional TOML file, then environment
    /// overrides, in that priority order (env wins).
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(from_file) = Self::load_from_file()? {
            config = from_file;
        }
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn load_from_file() -> anyhow::Result<Option<Self>> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(toml::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = get_env_string("DESTINATION_REGEX") {
            self.destination_regex = v;
        }
        if let Some(v) = get_env_string("SUCCESS_FILENAME") {
            self.success_filename = v;
        }
        if let Some(v) = get_env_string("START_BACKFILL_FILENAME") {
            self.start_backfill_filename = Some(v);
        }
        if let Some(v) = get_env_u64("MAX_BATCH_BYTES") {
            self.max_batch_bytes = v;
        }
        if let Some(v) = get_env_u64("WAIT_FOR_JOB_SECONDS") {
            self.wait_for_job_secs = v;
        }
        if let Some(v) = get_env_u64("JOB_POLL_INTERVAL_SECONDS") {
            self.job_poll_interval_secs = v;
        }
        if let Some(v) = get_env_u64("RESTART_BUFFER_SECONDS") {
            self.restart_buffer_secs = v;
        }
        if let Some(v) = get_env_u64("ENSURE_SUBSCRIBER_SECONDS") {
            self.ensure_subscriber_secs = v;
        }
        if let Some(v) = get_env_bool("ORDER_ALL_JOBS") {
            self.order_all_jobs = v;
        }
        if let Some(v) = get_env_string("JOB_PREFIX") {
            self.job_prefix = v;
        }
        if let Some(v) = get_env_u64("FUNCTION_TIMEOUT_SEC") {
            self.function_timeout_secs = v;
        }
        if let Some(v) = get_env_string("WAREHOUSE_PROJECT") {
            self.warehouse_project = Some(v);
        }
        if let Some(v) = get_env_string("BUCKET") {
            self.bucket = Some(v);
        }
    }

    /// Rejects configuration that would otherwise fail lazily mid-invocation.
    pub fn validate(&self) -> anyhow::Result<()> {
        regex::Regex::new(&self.destination_regex)
            .map_err(|e| anyhow::anyhow!("invalid destination_regex: {e}"))?;
        if self.function_timeout_secs == 0 {
            anyhow::bail!("function_timeout_secs must be nonzero");
        }
        Ok(())
    }
}

fn get_env_string(suffix: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

fn get_env_u64(suffix: &str) -> Option<u64> {
    get_env_string(suffix).and_then(|v| v.parse().ok())
}

fn get_env_bool(suffix: &str) -> Option<bool> {
    get_env_string(suffix).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn defaults_match_spec_constants() {
        let _guard = env_lock().lock().unwrap();
        let config = RuntimeConfig::default();
        assert_eq!(config.max_batch_bytes, 15_000_000_000_000);
        assert_eq!(config.job_prefix, "gcf-ingest-");
        assert!(!config.order_all_jobs);
        assert_eq!(config.success_filename, "_SUCCESS");
    }

    #[test]
    fn env_override_wins_over_default() {
        let _guard = env_lock().lock().unwrap();
        env::set_var("INGEST_ORDER_ALL_JOBS", "true");
        let mut config = RuntimeConfig::default();
        config.apply_env_overrides();
        assert!(config.order_all_jobs);
        env::remove_var("INGEST_ORDER_ALL_JOBS");
    }

    #[test]
    fn validate_rejects_bad_regex() {
        let _guard = env_lock().lock().unwrap();
        let mut config = RuntimeConfig::default();
        config.destination_regex = "(unterminated".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let _guard = env_lock().lock().unwrap();
        let mut config = RuntimeConfig::default();
        config.function_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
