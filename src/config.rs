//! CLI configuration and argument parsing.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("GIT_COMMIT"),
    ", build date: ",
    env!("BUILD_DATE"),
    ")"
);

pub mod env {
    pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
    pub const GITHUB_API_URL: &str = "GITHUB_API_URL";
    pub const OUTPUT_FORMAT: &str = "OUTPUT_FORMAT";
    pub const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
    pub const CONCURRENT_SCANS: &str = "CONCURRENT_SCANS";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
    pub const NO_COLOR: &str = "NO_COLOR";
}

/// How much per-repository status output the scan prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Only repositories with alerts or errors stay on screen.
    Quiet,
    /// Every scanned repository keeps a status line.
    Verbose,
}

/// What the invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CheckAlerts,
    ListDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Column set for the per-repository alert table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableLayout {
    /// CVE ID, summary, severity, created, URL
    Advisory,
    /// Package, severity, created, URL
    Package,
}

/// Report open Dependabot alerts across your GitHub repositories.
#[derive(Parser, Debug, Clone)]
#[command(name = "dependabot-scanner")]
#[command(about = "Report open Dependabot alerts across your GitHub repositories")]
#[command(version, long_version = LONG_VERSION)]
pub struct Args {
    /// GitHub personal access token
    #[arg(long, env = env::GITHUB_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub REST API base URL (GHES: https://<host>/api/v3)
    #[arg(long, env = env::GITHUB_API_URL, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Only print repositories with alerts
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print status for every scanned repository [default]
    #[arg(short, long)]
    pub verbose: bool,

    /// List repositories without Dependabot alerts enabled instead of scanning
    #[arg(short = 'l', long, conflicts_with = "check_alerts")]
    pub list_disabled: bool,

    /// Scan enabled repositories for open alerts [default]
    #[arg(short = 'c', long)]
    pub check_alerts: bool,

    /// Report output format
    #[arg(long, env = env::OUTPUT_FORMAT, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Alert table columns
    #[arg(long, value_enum, default_value_t = TableLayout::Advisory)]
    pub layout: TableLayout,

    /// Timeout in seconds for each GitHub API request
    #[arg(long, env = env::REQUEST_TIMEOUT, default_value_t = 30)]
    pub request_timeout: u64,

    /// Number of repositories scanned in parallel
    #[arg(long, env = env::CONCURRENT_SCANS, default_value_t = 1)]
    pub concurrent_scans: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = env::LOG_LEVEL, default_value = "warn")]
    pub log_level: String,

    /// Log format: pretty or json
    #[arg(long, env = env::LOG_FORMAT, default_value = "pretty")]
    pub log_format: String,

    /// Disable colored output
    #[arg(long, env = env::NO_COLOR)]
    pub no_color: bool,
}

/// Application configuration derived from CLI args.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub api_url: String,
    pub report_mode: ReportMode,
    pub operation: Operation,
    pub format: OutputFormat,
    pub layout: TableLayout,
    pub request_timeout: u64,
    pub concurrent_scans: usize,
    pub log_level: String,
    pub log_format: String,
    pub color: bool,
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        let report_mode = if args.quiet {
            ReportMode::Quiet
        } else {
            ReportMode::Verbose
        };

        let operation = if args.list_disabled {
            Operation::ListDisabled
        } else {
            Operation::CheckAlerts
        };

        let color = !args.no_color
            && args.format == OutputFormat::Text
            && std::io::stdout().is_terminal();

        Self {
            github_token: args.token.filter(|t| !t.trim().is_empty()),
            api_url: args.api_url.trim_end_matches('/').to_string(),
            report_mode,
            operation,
            format: args.format,
            layout: args.layout,
            request_timeout: args.request_timeout,
            concurrent_scans: args.concurrent_scans,
            log_level: args.log_level,
            log_format: args.log_format,
            color,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.github_token.is_none() {
            return Err(anyhow!(
                "Environment variable {} is required but not set",
                env::GITHUB_TOKEN
            ));
        }

        if !self.api_url.starts_with("https://") && !self.api_url.starts_with("http://") {
            return Err(anyhow!(
                "Invalid GitHub API URL: {}. Expected an http:// or https:// URL",
                self.api_url
            ));
        }

        if self.concurrent_scans == 0 {
            return Err(anyhow!("Concurrent scans must be at least 1"));
        }

        if self.request_timeout == 0 {
            return Err(anyhow!("Request timeout must be greater than 0 seconds"));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[cfg(test)]
impl Config {
    pub fn new_for_test(github_token: &str) -> Self {
        Self {
            github_token: Some(github_token.to_string()),
            api_url: DEFAULT_API_URL.to_string(),
            report_mode: ReportMode::Verbose,
            operation: Operation::CheckAlerts,
            format: OutputFormat::Text,
            layout: TableLayout::Advisory,
            request_timeout: 30,
            concurrent_scans: 1,
            log_level: "warn".to_string(),
            log_format: "pretty".to_string(),
            color: false,
        }
    }
}
