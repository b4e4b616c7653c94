use std::ffi::OsString;

use clap::Parser;

use latency_core::Overrides;

/// End-to-end read latency workload for Azure Cosmos DB.
///
/// Seeds a fixed set of documents, then runs concurrent point reads against
/// random members until <ENTER> or Ctrl+C. Every option can also be set
/// through the environment variable shown next to it; flags win.
#[derive(Parser, Debug, Default)]
#[command(name = "e2e-latency", version, about)]
pub struct CliArgs {
    /// Service endpoint [env: COSMOS_SERVICE_ENDPOINT]
    #[arg(long = "serviceEndpoint", value_name = "URL")]
    pub service_endpoint: Option<String>,

    /// Master key [env: COSMOS_KEY]
    #[arg(long = "masterKey", value_name = "KEY")]
    pub master_key: Option<String>,

    /// Database ID [env: COSMOS_DATABASE_ID]
    #[arg(long = "databaseId", value_name = "ID")]
    pub database_id: Option<String>,

    /// Container ID [env: COSMOS_CONTAINER_ID]
    #[arg(long = "containerId", value_name = "ID")]
    pub container_id: Option<String>,

    /// Comma-separated preferred regions [env: COSMOS_PREFERRED_REGIONS]
    #[arg(long = "preferredRegions", value_name = "REGIONS")]
    pub preferred_regions: Option<String>,

    /// Number of concurrent readers executing the workload [env: CONCURRENCY] (default 1)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Diagnostics sampling rate in [0, 1] [env: COSMOS_DIAGNOSTICS_SAMPLING_RATE] (default 1)
    #[arg(long = "diagnosticsSampling", value_name = "RATE")]
    pub diagnostics_sampling: Option<f64>,

    /// Enable request level transport tracing [env: COSMOS_TRANSPORT_TRACING_ENABLED]
    #[arg(long = "enableTransportLevelTracing")]
    pub enable_transport_level_tracing: bool,

    /// Number of properties the seeded documents should have [env: COSMOS_PROPERTY_COUNT] (default 20)
    #[arg(long = "propertyCount", value_name = "N")]
    pub property_count: Option<usize>,

    /// Seconds between progress reports, 0 disables [env: REPORT_INTERVAL_SECONDS] (default 10)
    #[arg(long = "reportInterval", value_name = "SECONDS")]
    pub report_interval: Option<u64>,
}

impl CliArgs {
    /// Parse the process arguments, accepting `-flag` as well as `--flag`.
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            service_endpoint: self.service_endpoint.clone(),
            master_key: self.master_key.clone(),
            database_id: self.database_id.clone(),
            container_id: self.container_id.clone(),
            preferred_regions: self.preferred_regions.clone(),
            concurrency: self.concurrency,
            property_count: self.property_count,
            diagnostics_sampling_rate: self.diagnostics_sampling,
            transport_tracing: self.enable_transport_level_tracing.then_some(true),
            report_interval_secs: self.report_interval,
        }
    }
}

/// Rewrite single-dash long options (`-concurrency`) to `--concurrency`.
///
/// Short flags (`-h`), negative numbers and everything after `--` are left alone.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || passthrough {
                return arg;
            }
            match arg.to_str() {
                Some("--") => {
                    passthrough = true;
                    arg
                }
                Some(s) if is_single_dash_long(s) => OsString::from(format!("-{s}")),
                _ => arg,
            }
        })
        .collect()
}

fn is_single_dash_long(arg: &str) -> bool {
    match arg.strip_prefix('-') {
        Some(rest) if !rest.starts_with('-') && rest.len() > 1 => rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic()),
        _ => false,
    }
}
