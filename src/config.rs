//! Environment-driven settings for the `bucketscan` binary.
//!
//! | Variable | Default |
//! |---|---|
//! | `BUCKET_ROOT` | required |
//! | `CLAMAV_HOST` / `CLAMAV_PORT` | `127.0.0.1` / `3310` |
//! | `CLAMAV_SOCKET` | unset, overrides host and port |
//! | `MAX_FILE_SIZE` | `26214400` |
//! | `SCAN_MAX_ATTEMPTS` | `3` |
//! | `SCAN_BACKOFF_SECONDS` | `2` |
//! | `SCAN_TIMEOUT_SECONDS` | unset |
//! | `SCAN_LIMIT` | unset |
//! | `ELIGIBILITY_MODE` | `size` (`staleness`, `both`) |
//! | `RESCAN_AFTER_SECONDS` | `604800` |
//! | `TAG_RESULTS` | `false` |
//! | `FAIL_ON_SKIPPED` / `FAIL_ON_ERROR` / `FAIL_ON_INFECTED` | `true` |
//!
//! Empty values mean "use the default".

#[cfg(feature = "clamav")]
use crate::backends::ClamAvConfig;
use crate::eligibility::{
    Composite, EligibilityPredicate, SizeLimit, Staleness, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_RESCAN_AFTER,
};
use crate::manager::{OrchestratorConfig, RetryConfig};
use crate::policy::FailurePolicy;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable {var}")]
    Missing {
        /// Variable name.
        var: &'static str,
    },

    /// A variable has a value that cannot be used.
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Which eligibility predicate a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EligibilityMode {
    /// Skip objects over the size limit.
    #[default]
    Size,
    /// Rescan objects without a recent clean verdict.
    Staleness,
    /// Size check first, then staleness.
    Both,
}

impl FromStr for EligibilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "size" => Ok(Self::Size),
            "staleness" => Ok(Self::Staleness),
            "both" => Ok(Self::Both),
            _ => Err("expected one of size, staleness, both".to_string()),
        }
    }
}

/// Everything the binary needs to run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory treated as the bucket.
    pub bucket_root: PathBuf,

    /// Daemon connection settings.
    #[cfg(feature = "clamav")]
    pub clamav: ClamAvConfig,

    /// Per-object retry behavior.
    pub retry: RetryConfig,

    /// Maximum number of objects scanned.
    pub limit: Option<usize>,

    /// Eligibility predicate selection.
    pub eligibility: EligibilityMode,

    /// Size limit in bytes.
    pub max_file_size: u64,

    /// Age after which a clean verdict is stale.
    pub rescan_after: Duration,

    /// Whether verdicts are written back as metadata tags.
    pub tag_results: bool,

    /// Exit policy.
    pub policy: FailurePolicy,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads settings through `lookup`, which returns the value of a
    /// variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let bucket_root = env
            .get("BUCKET_ROOT")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing { var: "BUCKET_ROOT" })?;

        let max_attempts: u32 = env.parse("SCAN_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(env.invalid("SCAN_MAX_ATTEMPTS", "must be at least 1"));
        }
        let backoff_base: f64 = env.parse("SCAN_BACKOFF_SECONDS", 2.0)?;
        if !backoff_base.is_finite() || backoff_base < 0.0 {
            return Err(env.invalid("SCAN_BACKOFF_SECONDS", "must be a non-negative number"));
        }

        let policy = FailurePolicy {
            fail_on_skipped: env.flag("FAIL_ON_SKIPPED", true),
            fail_on_error: env.flag("FAIL_ON_ERROR", true),
            fail_on_infected: env.flag("FAIL_ON_INFECTED", true),
        };

        Ok(Self {
            bucket_root,
            #[cfg(feature = "clamav")]
            clamav: clamav_config(&env)?,
            retry: RetryConfig::new()
                .with_max_attempts(max_attempts)
                .with_backoff_base(backoff_base),
            limit: env.parse_opt("SCAN_LIMIT")?,
            eligibility: env.parse("ELIGIBILITY_MODE", EligibilityMode::default())?,
            max_file_size: env.parse("MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?,
            rescan_after: Duration::from_secs(
                env.parse("RESCAN_AFTER_SECONDS", DEFAULT_RESCAN_AFTER.as_secs())?,
            ),
            tag_results: env.flag("TAG_RESULTS", false),
            policy,
        })
    }

    /// Builds the eligibility predicate for the configured mode.
    pub fn predicate(&self) -> Box<dyn EligibilityPredicate> {
        let size = SizeLimit::new(self.max_file_size);
        let staleness = Staleness::new(self.rescan_after);
        match self.eligibility {
            EligibilityMode::Size => Box::new(size),
            EligibilityMode::Staleness => Box::new(staleness),
            EligibilityMode::Both => Box::new(Composite::new(size, staleness)),
        }
    }

    /// Builds the orchestrator configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new()
            .with_retry(self.retry.clone())
            .with_limit(self.limit)
            .with_tag_results(self.tag_results)
    }
}

#[cfg(feature = "clamav")]
fn clamav_config<F>(env: &Env<F>) -> Result<ClamAvConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ClamAvConfig::new();

    if let Some(socket) = env.get("CLAMAV_SOCKET") {
        config = config.with_socket(socket);
    } else {
        let host = env.get("CLAMAV_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port: u16 = env.parse("CLAMAV_PORT", 3310)?;
        let address = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        config = config.with_tcp(address);
    }

    let timeout: Option<f64> = env.parse_opt("SCAN_TIMEOUT_SECONDS")?;
    if let Some(secs) = timeout {
        let timeout = Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| env.invalid("SCAN_TIMEOUT_SECONDS", "must be a positive number"))?;
        config = config.with_scan_timeout(Some(timeout));
    }

    Ok(config)
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Returns the trimmed value, treating empty as unset.
    fn get(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_opt(var)?.unwrap_or(default))
    }

    fn parse_opt<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            None => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::Invalid {
                    var,
                    value,
                    reason: e.to_string(),
                }),
        }
    }

    /// `0`, `false`, `no` and `off` are false; any other value is true.
    fn flag(&self, var: &str, default: bool) -> bool {
        match self.get(var) {
            None => default,
            Some(value) => !matches!(
                value.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            ),
        }
    }

    fn invalid(&self, var: &'static str, reason: &str) -> ConfigError {
        ConfigError::Invalid {
            var,
            value: self.get(var).unwrap_or_default(),
            reason: reason.to_string(),
        }
    }
}
