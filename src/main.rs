mod config;
mod error;
mod github;
mod logger;
mod models;
mod reporter;
mod scanner;
mod status;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Args, Config, Operation};
use github::{AlertPlatform, GitHubPlatform, create_github_client};
use scanner::Scanner;
use status::{SpinnerBoard, StatusReporter};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = Config::from_args(Args::parse());
    logger::init_logger(&config.log_level, &config.log_format);

    if let Err(e) = run(config).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    info!("Starting Dependabot Scanner");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!(
        api_url = %config.api_url,
        operation = ?config.operation,
        report_mode = ?config.report_mode,
        format = ?config.format,
        request_timeout = config.request_timeout,
        concurrent_scans = config.concurrent_scans,
        "Configuration loaded"
    );

    config
        .validate()
        .context("Configuration validation failed")?;

    let platform: Arc<dyn AlertPlatform> = Arc::new(build_platform(&config)?);
    let status: Arc<dyn StatusReporter> =
        Arc::new(SpinnerBoard::new(config.report_mode).context("Failed to create status board")?);

    let login = platform
        .authenticated_login()
        .await
        .context("Failed to verify GitHub credentials")?;
    status.report(&format!("Inventorying repositories for {login}"));

    let repos = platform
        .list_repositories()
        .await
        .context("Failed to list repositories")?;
    info!("Found {} repositories", repos.len());

    let scanner = Scanner::new(Arc::clone(&platform), status, config.concurrent_scans);
    let formatter = reporter::create_formatter(config.format, config.layout, config.color);

    let output = match config.operation {
        Operation::ListDisabled => {
            let classification = scanner.classify(repos).await;
            formatter
                .format_disabled(&classification.disabled)
                .context("Failed to render disabled repositories")?
        }
        Operation::CheckAlerts => {
            let run = scanner.run(repos).await;
            info!(
                total_repos = run.total_repos,
                enabled = run.enabled_repos,
                disabled = run.disabled_repos,
                failed = run.failed_repos,
                max_concurrent_scans = run.max_concurrent_scans,
                "Scan summary"
            );
            formatter
                .format(&run.results)
                .context("Failed to render scan results")?
        }
    };

    println!("{output}");

    info!("Dependabot Scanner completed successfully");
    Ok(())
}

fn build_platform(config: &Config) -> Result<GitHubPlatform> {
    let token = config
        .github_token
        .as_deref()
        .context("GitHub token is not configured")?;
    let client = create_github_client(&config.api_url, token)?;
    Ok(GitHubPlatform::new(
        client,
        &config.api_url,
        config.request_timeout(),
    ))
}
