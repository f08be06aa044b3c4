use crate::error::ScanError;
use crate::models::{Alert, Repository, Severity};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::{Octocrab, Page};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const PER_PAGE: u8 = 100;

/// Read-only view of the remote platform used by the scanner.
#[async_trait]
pub trait AlertPlatform: Send + Sync {
    /// Login of the identity behind the token.
    async fn authenticated_login(&self) -> Result<String, ScanError>;

    /// Every repository the authenticated identity can see.
    async fn list_repositories(&self) -> Result<Vec<Repository>, ScanError>;

    /// Whether Dependabot alerts are enabled for the repository.
    async fn vulnerability_alerts_enabled(&self, repo: &Repository) -> Result<bool, ScanError>;

    /// Open Dependabot alerts for the repository, in platform order.
    async fn open_alerts(&self, repo: &Repository) -> Result<Vec<Alert>, ScanError>;
}

pub fn create_github_client(api_url: &str, token: &str) -> Result<Octocrab> {
    info!("Initializing GitHub client with API URL: {}", api_url);

    Octocrab::builder()
        .personal_token(token.to_string())
        .base_uri(api_url)
        .context("Failed to parse GitHub API URL")?
        .build()
        .context("Failed to build GitHub client")
}

pub struct GitHubPlatform {
    client: Arc<Octocrab>,
    api_url: String,
    request_timeout: Duration,
}

impl GitHubPlatform {
    pub fn new(client: Octocrab, api_url: &str, request_timeout: Duration) -> Self {
        info!(
            "Request timeout set to {} seconds",
            request_timeout.as_secs()
        );

        Self {
            client: Arc::new(client),
            api_url: api_url.trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    async fn timed<T, F>(&self, what: &str, request: F) -> Result<T, ScanError>
    where
        F: Future<Output = octocrab::Result<T>>,
    {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ScanError::from(e)),
            Err(_) => Err(ScanError::timeout(what, self.request_timeout.as_secs())),
        }
    }
}

#[derive(Serialize)]
struct PageQuery {
    per_page: u8,
}

#[derive(Serialize)]
struct AlertQuery<'a> {
    state: &'a str,
    per_page: u8,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    id: u64,
    full_name: String,
    html_url: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    archived: bool,
}

impl From<RawRepository> for Repository {
    fn from(raw: RawRepository) -> Self {
        Self {
            html_url: raw.html_url,
            private: raw.private,
            archived: raw.archived,
            ..Repository::new(raw.id, raw.full_name)
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAlert {
    html_url: String,
    created_at: DateTime<Utc>,
    security_advisory: RawAdvisory,
    dependency: Option<RawDependency>,
    security_vulnerability: Option<RawDependency>,
}

#[derive(Debug, Deserialize)]
struct RawAdvisory {
    summary: String,
    cve_id: Option<String>,
    severity: String,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    package: Option<RawPackage>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
}

impl From<RawAlert> for Alert {
    fn from(raw: RawAlert) -> Self {
        let package = [raw.dependency, raw.security_vulnerability]
            .into_iter()
            .flatten()
            .find_map(|d| d.package.map(|p| p.name));

        Self {
            summary: raw.security_advisory.summary,
            advisory_id: raw.security_advisory.cve_id.filter(|id| !id.is_empty()),
            severity: Severity::from(raw.security_advisory.severity.as_str()),
            created_on: raw.created_at.date_naive(),
            url: raw.html_url,
            package,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawErrorBody {
    message: String,
}

/// The `message` field of a GitHub error body, or empty when absent.
fn error_message(body: &str) -> String {
    serde_json::from_str::<RawErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_default()
}

/// Validate raw alert records once; malformed ones are logged and dropped.
fn normalize_alerts(repo: &str, records: Vec<Value>) -> Vec<Alert> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(idx, record)| match serde_json::from_value::<RawAlert>(record) {
            Ok(raw) => Some(Alert::from(raw)),
            Err(e) => {
                warn!(
                    repository = %repo,
                    record = idx,
                    error = %e,
                    "Skipping malformed Dependabot alert record"
                );
                None
            }
        })
        .collect()
}

#[async_trait]
impl AlertPlatform for GitHubPlatform {
    async fn authenticated_login(&self) -> Result<String, ScanError> {
        let user: RawUser = self
            .timed(
                "fetching authenticated user",
                self.client.get("/user", None::<&()>),
            )
            .await?;

        Ok(user.login)
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, ScanError> {
        let query = PageQuery { per_page: PER_PAGE };
        let first: Page<RawRepository> = self
            .timed("listing repositories", self.client.get("/user/repos", Some(&query)))
            .await?;

        let repos = self
            .timed("listing repositories", self.client.all_pages(first))
            .await?;

        info!("Successfully listed all {} repositories", repos.len());
        Ok(repos.into_iter().map(Repository::from).collect())
    }

    async fn vulnerability_alerts_enabled(&self, repo: &Repository) -> Result<bool, ScanError> {
        let url = format!("{}/repositories/{}/vulnerability-alerts", self.api_url, repo.id);
        let what = format!("checking vulnerability alerts for {}", repo.full_name);

        let response = self.timed(&what, self.client._get(url)).await?;
        let status = response.status();
        debug!(
            repository = %repo.full_name,
            status = status.as_u16(),
            "Vulnerability alerts capability checked"
        );

        if status.is_success() {
            return Ok(true);
        }

        if status.as_u16() == 404 {
            return Ok(false);
        }

        let body = self
            .timed(&what, self.client.body_to_string(response))
            .await
            .unwrap_or_default();
        Err(ScanError::from_status(status.as_u16(), error_message(&body)))
    }

    async fn open_alerts(&self, repo: &Repository) -> Result<Vec<Alert>, ScanError> {
        let route = format!("/repos/{}/dependabot/alerts", repo.full_name);
        let query = AlertQuery {
            state: "open",
            per_page: PER_PAGE,
        };
        let what = format!("listing alerts for {}", repo.full_name);

        let first: Page<Value> = self
            .timed(&what, self.client.get(route, Some(&query)))
            .await?;
        let records = self.timed(&what, self.client.all_pages(first)).await?;

        debug!(
            repository = %repo.full_name,
            records = records.len(),
            "Fetched open Dependabot alert records"
        );

        Ok(normalize_alerts(&repo.full_name, records))
    }
}
