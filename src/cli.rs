//! Command-line and environment configuration
//!
//! Every option can be given as a flag or through its environment variable,
//! which is how the service is normally configured when run in a container.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::data::schedule::DEFAULT_UPSTREAM_URL;
use crate::data::SelectionPolicy;
use crate::refresh::{RefreshConfig, RetryPolicy};

/// Address looked up when none is configured
pub const DEFAULT_ADDRESS: &str = "začret 69";

/// Error types for configuration parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A duration option was zero
    #[error("Invalid {0}: must be greater than zero")]
    ZeroDuration(&'static str),

    /// The retry attempt count was zero
    #[error("Invalid retry attempts: at least one attempt is required")]
    ZeroAttempts,
}

/// Record selection as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelectArg {
    /// Use the first record returned
    First,
    /// Use the record whose query equals the address
    ExactQuery,
}

impl From<SelectArg> for SelectionPolicy {
    fn from(arg: SelectArg) -> Self {
        match arg {
            SelectArg::First => SelectionPolicy::First,
            SelectArg::ExactQuery => SelectionPolicy::ExactQuery,
        }
    }
}

/// Bin Collector - serve the next waste collection dates for an address
#[derive(Parser, Debug)]
#[command(name = "bin-collector")]
#[command(about = "Caches and serves the next waste collection dates for an address")]
#[command(version)]
pub struct Cli {
    /// Address to look up
    #[arg(long, env = "ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Socket address to listen on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8081")]
    pub listen: SocketAddr,

    /// Schedule lookup endpoint
    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    /// HTML template for the index page
    #[arg(long, env = "TEMPLATE_PATH", default_value = "template.html")]
    pub template: PathBuf,

    /// Directory served under /static
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Seconds between refresh cycles
    #[arg(long, env = "REFRESH_INTERVAL", value_name = "SECS", default_value_t = 900)]
    pub refresh_interval: u64,

    /// Fetch attempts per refresh cycle
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Seconds to wait after a failed attempt
    #[arg(long, env = "RETRY_DELAY", value_name = "SECS", default_value_t = 5)]
    pub retry_delay: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", value_name = "SECS", default_value_t = 10)]
    pub request_timeout: u64,

    /// Which record to use when the upstream returns several
    #[arg(long, env = "SELECT", value_enum, default_value_t = SelectArg::First)]
    pub select: SelectArg,
}

/// Validated service configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub address: String,
    pub listen: SocketAddr,
    pub upstream_url: String,
    pub template: PathBuf,
    pub static_dir: PathBuf,
    pub request_timeout: Duration,
    pub selection: SelectionPolicy,
    pub refresh: RefreshConfig,
}

impl ServiceConfig {
    /// Creates a ServiceConfig from parsed CLI arguments.
    ///
    /// An empty (or blank) address falls back to [`DEFAULT_ADDRESS`].
    ///
    /// # Returns
    /// * `Ok(ServiceConfig)` with durations converted
    /// * `Err(CliError)` if a count or duration is zero
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.retry_attempts == 0 {
            return Err(CliError::ZeroAttempts);
        }
        if cli.refresh_interval == 0 {
            return Err(CliError::ZeroDuration("refresh interval"));
        }
        if cli.request_timeout == 0 {
            return Err(CliError::ZeroDuration("request timeout"));
        }

        let address = match cli.address.trim() {
            "" => DEFAULT_ADDRESS.to_string(),
            _ => cli.address.clone(),
        };

        Ok(ServiceConfig {
            address,
            listen: cli.listen,
            upstream_url: cli.upstream_url.clone(),
            template: cli.template.clone(),
            static_dir: cli.static_dir.clone(),
            request_timeout: Duration::from_secs(cli.request_timeout),
            selection: cli.select.into(),
            refresh: RefreshConfig {
                interval: Duration::from_secs(cli.refresh_interval),
                retry: RetryPolicy {
                    max_attempts: cli.retry_attempts,
                    delay: Duration::from_secs(cli.retry_delay),
                    ..Default::default()
                },
            },
        })
    }
}
