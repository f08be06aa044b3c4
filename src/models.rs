use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// A repository visible to the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    pub id: u64,
    pub full_name: String,
    pub html_url: Option<String>,
    pub private: bool,
    pub archived: bool,
}

impl Repository {
    pub fn new(id: u64, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            html_url: None,
            private: false,
            archived: false,
        }
    }

    pub fn visibility(&self) -> &'static str {
        if self.private { "private" } else { "public" }
    }
}

/// Advisory severity as reported by GitHub.
///
/// Every variant keeps the text it was parsed from, so rendering shows
/// exactly what the platform sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Critical(String),
    High(String),
    Medium(String),
    Low(String),
    /// Unrecognized severity text.
    Other(String),
}

/// Visual weight used when rendering a severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Strongest,
    Strong,
    Medium,
    Mild,
    Plain,
}

impl Severity {
    pub fn emphasis(&self) -> Emphasis {
        match self {
            Severity::Critical(_) => Emphasis::Strongest,
            Severity::High(_) => Emphasis::Strong,
            Severity::Medium(_) => Emphasis::Medium,
            Severity::Low(_) => Emphasis::Mild,
            Severity::Other(_) => Emphasis::Plain,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Critical(raw)
            | Severity::High(raw)
            | Severity::Medium(raw)
            | Severity::Low(raw)
            | Severity::Other(raw) => raw,
        }
    }
}

impl From<&str> for Severity {
    fn from(s: &str) -> Self {
        let raw = s.to_string();
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical(raw),
            "high" => Severity::High(raw),
            "medium" => Severity::Medium(raw),
            "low" => Severity::Low(raw),
            _ => Severity::Other(raw),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// An open Dependabot alert, normalized at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub summary: String,
    pub advisory_id: Option<String>,
    pub severity: Severity,
    pub created_on: NaiveDate,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

/// Open alerts for a single repository. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub repository: String,
    pub alert_count: usize,
    pub alerts: Vec<Alert>,
}

impl ScanResult {
    /// Returns `None` when there are no alerts, so a result always
    /// carries `alert_count == alerts.len() >= 1`.
    pub fn new(repository: impl Into<String>, alerts: Vec<Alert>) -> Option<Self> {
        if alerts.is_empty() {
            return None;
        }

        Some(Self {
            repository: repository.into(),
            alert_count: alerts.len(),
            alerts,
        })
    }
}

/// Repositories split by whether Dependabot alerts are enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub enabled: Vec<Repository>,
    pub disabled: Vec<Repository>,
}

/// Everything collected during one invocation.
#[derive(Debug, Clone, Default)]
pub struct ScanRun {
    pub results: Vec<ScanResult>,
    pub total_repos: usize,
    pub enabled_repos: usize,
    pub disabled_repos: usize,
    pub failed_repos: usize,
    pub max_concurrent_scans: usize,
    pub scan_duration: Duration,
}

impl ScanRun {
    pub fn total_alerts(&self) -> usize {
        self.results.iter().map(|r| r.alert_count).sum()
    }
}

#[cfg(test)]
pub(crate) fn sample_alert(advisory_id: &str, severity: &str) -> Alert {
    Alert {
        summary: format!("Advisory {advisory_id}"),
        advisory_id: Some(advisory_id.to_string()),
        severity: Severity::from(severity),
        created_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        url: format!("https://github.com/acme/api/security/dependabot/{advisory_id}"),
        package: None,
    }
}
