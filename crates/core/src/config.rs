use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

// ── Environment keys ──────────────────────────────────────────

pub const ENV_SERVICE_ENDPOINT: &str = "COSMOS_SERVICE_ENDPOINT";
pub const ENV_MASTER_KEY: &str = "COSMOS_KEY";
pub const ENV_DATABASE_ID: &str = "COSMOS_DATABASE_ID";
pub const ENV_CONTAINER_ID: &str = "COSMOS_CONTAINER_ID";
pub const ENV_PREFERRED_REGIONS: &str = "COSMOS_PREFERRED_REGIONS";
pub const ENV_CONCURRENCY: &str = "CONCURRENCY";
pub const ENV_PROPERTY_COUNT: &str = "COSMOS_PROPERTY_COUNT";
pub const ENV_DIAGNOSTICS_SAMPLING_RATE: &str = "COSMOS_DIAGNOSTICS_SAMPLING_RATE";
pub const ENV_TRANSPORT_TRACING_ENABLED: &str = "COSMOS_TRANSPORT_TRACING_ENABLED";
pub const ENV_REPORT_INTERVAL: &str = "REPORT_INTERVAL_SECONDS";

// ── Defaults ──────────────────────────────────────────────────

pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_PROPERTY_COUNT: usize = 20;
pub const DEFAULT_DIAGNOSTICS_SAMPLING_RATE: f64 = 1.0;
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 10;

/// Values given on the command line. `None` means the flag was not supplied,
/// so the environment (then the compiled default) decides.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub service_endpoint: Option<String>,
    pub master_key: Option<String>,
    pub database_id: Option<String>,
    pub container_id: Option<String>,
    pub preferred_regions: Option<String>,
    pub concurrency: Option<usize>,
    pub property_count: Option<usize>,
    pub diagnostics_sampling_rate: Option<f64>,
    pub transport_tracing: Option<bool>,
    pub report_interval_secs: Option<u64>,
}

/// Account master key. Never printed.
#[derive(Clone, PartialEq)]
pub struct MasterKey(String);

impl MasterKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(***)")
    }
}

// ── Settings ──────────────────────────────────────────────────

/// Fully resolved workload settings. Built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: Url,
    pub master_key: MasterKey,
    pub database_id: String,
    pub container_id: String,
    pub preferred_regions: Vec<String>,
    pub concurrency: usize,
    pub property_count: usize,
    pub diagnostics_sampling_rate: f64,
    pub transport_tracing: bool,
    /// Interval between progress reports; `None` disables them.
    pub report_interval: Option<Duration>,
}

impl Settings {
    /// Resolve settings from command-line overrides layered over the
    /// process environment (call `load_dotenv()` first).
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |key| env::var(key).ok())
    }

    /// Resolve settings with an explicit environment lookup.
    ///
    /// Precedence per option: flag, then non-empty env value, then default.
    /// Every non-empty env value is parsed, so a malformed one fails even
    /// when a flag overrides it.
    pub fn resolve<F>(overrides: Overrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvLayer { lookup };

        let endpoint = required(
            overrides.service_endpoint,
            &env,
            "serviceEndpoint",
            ENV_SERVICE_ENDPOINT,
        )?;
        let endpoint = parse_endpoint(&endpoint)?;

        let master_key = MasterKey::new(required(
            overrides.master_key,
            &env,
            "masterKey",
            ENV_MASTER_KEY,
        )?);
        let database_id = required(overrides.database_id, &env, "databaseId", ENV_DATABASE_ID)?;
        let container_id =
            required(overrides.container_id, &env, "containerId", ENV_CONTAINER_ID)?;

        let preferred_regions = non_empty(overrides.preferred_regions)
            .or_else(|| env.string(ENV_PREFERRED_REGIONS))
            .map(|raw| split_regions(&raw))
            .unwrap_or_default();

        let env_concurrency: Option<usize> = env.parsed(ENV_CONCURRENCY)?;
        let env_property_count: Option<usize> = env.parsed(ENV_PROPERTY_COUNT)?;
        let env_sampling_rate: Option<f64> = env.parsed(ENV_DIAGNOSTICS_SAMPLING_RATE)?;
        let env_transport_tracing = env.boolean(ENV_TRANSPORT_TRACING_ENABLED)?;
        let env_report_secs: Option<u64> = env.parsed(ENV_REPORT_INTERVAL)?;

        let concurrency = overrides
            .concurrency
            .or(env_concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                option: "concurrency",
                reason: "must be at least 1".into(),
            });
        }

        let property_count = overrides
            .property_count
            .or(env_property_count)
            .unwrap_or(DEFAULT_PROPERTY_COUNT);

        let diagnostics_sampling_rate = overrides
            .diagnostics_sampling_rate
            .or(env_sampling_rate)
            .unwrap_or(DEFAULT_DIAGNOSTICS_SAMPLING_RATE);
        if !(0.0..=1.0).contains(&diagnostics_sampling_rate) {
            return Err(ConfigError::Invalid {
                option: "diagnosticsSampling",
                reason: format!("{diagnostics_sampling_rate} is outside [0, 1]"),
            });
        }

        let transport_tracing = overrides
            .transport_tracing
            .or(env_transport_tracing)
            .unwrap_or(false);

        let report_secs = overrides
            .report_interval_secs
            .or(env_report_secs)
            .unwrap_or(DEFAULT_REPORT_INTERVAL_SECS);
        let report_interval = (report_secs > 0).then(|| Duration::from_secs(report_secs));

        Ok(Self {
            endpoint,
            master_key,
            database_id,
            container_id,
            preferred_regions,
            concurrency,
            property_count,
            diagnostics_sampling_rate,
            transport_tracing,
            report_interval,
        })
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Settings resolved:");
        for line in self.summary_lines() {
            tracing::info!("  {line}");
        }
    }

    /// One line per resolved setting; the master key is never included.
    pub fn summary_lines(&self) -> Vec<String> {
        let regions = if self.preferred_regions.is_empty() {
            "(account default)".to_string()
        } else {
            self.preferred_regions.join(", ")
        };
        let reporting = match self.report_interval {
            Some(interval) => format!("every {}s", interval.as_secs()),
            None => "disabled".to_string(),
        };
        vec![
            format!("endpoint:     {}", self.endpoint),
            format!("database:     {}", self.database_id),
            format!("container:    {}", self.container_id),
            format!("regions:      {regions}"),
            format!("concurrency:  {}", self.concurrency),
            format!("properties:   {}", self.property_count),
            format!("diagnostics:  sampling={}", self.diagnostics_sampling_rate),
            format!("tracing:      transport={}", self.transport_tracing),
            format!("reporting:    {reporting}"),
        ]
    }
}

// ── Env helpers ───────────────────────────────────────────────

struct EnvLayer<F> {
    lookup: F,
}

impl<F> EnvLayer<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value for `key`, if any.
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|s| !s.is_empty())
    }

    fn parsed<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.string(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::InvalidEnv {
                    key,
                    value: raw,
                    reason: e.to_string(),
                }),
        }
    }

    fn boolean(&self, key: &'static str) -> Result<Option<bool>, ConfigError> {
        match self.string(key) {
            None => Ok(None),
            Some(raw) => parse_bool(&raw).map(Some).ok_or(ConfigError::InvalidEnv {
                key,
                value: raw,
                reason: "expected true or false".into(),
            }),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn required<F>(
    flag: Option<String>,
    env: &EnvLayer<F>,
    option: &'static str,
    key: &'static str,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(flag)
        .or_else(|| env.string(key))
        .ok_or(ConfigError::Missing { option, env: key })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        option: "serviceEndpoint",
        reason: format!("{raw:?}: {e}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            option: "serviceEndpoint",
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

/// Split a comma-separated region list, dropping blanks.
pub fn split_regions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
