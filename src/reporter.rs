use crate::config::{OutputFormat, TableLayout};
use crate::models::{Alert, Emphasis, Repository, ScanResult, Severity};
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

const NO_ALERTS_MESSAGE: &str = "No open Dependabot alerts found in any repositories.";
const ALL_ENABLED_MESSAGE: &str = "All repositories have Dependabot alerts enabled.";
const MISSING: &str = "-";

pub trait ReportFormatter: Send + Sync {
    fn format(&self, results: &[ScanResult]) -> Result<String>;

    fn format_disabled(&self, repos: &[Repository]) -> Result<String>;
}

pub fn create_formatter(
    format: OutputFormat,
    layout: TableLayout,
    color: bool,
) -> Box<dyn ReportFormatter> {
    match format {
        OutputFormat::Text => Box::new(ConsoleFormatter::new(layout, color)),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

#[derive(Tabled)]
struct AdvisoryRow {
    #[tabled(rename = "CVE ID")]
    cve_id: String,
    #[tabled(rename = "SUMMARY")]
    summary: String,
    #[tabled(rename = "SEVERITY")]
    severity: String,
    #[tabled(rename = "CREATED")]
    created: String,
    #[tabled(rename = "URL")]
    url: String,
}

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "PACKAGE")]
    package: String,
    #[tabled(rename = "SEVERITY")]
    severity: String,
    #[tabled(rename = "CREATED")]
    created: String,
    #[tabled(rename = "URL")]
    url: String,
}

#[derive(Tabled)]
struct DisabledRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "VISIBILITY")]
    visibility: String,
    #[tabled(rename = "URL")]
    url: String,
}

/// Human-readable tables for a terminal.
pub struct ConsoleFormatter {
    layout: TableLayout,
    color: bool,
}

impl ConsoleFormatter {
    pub fn new(layout: TableLayout, color: bool) -> Self {
        Self { layout, color }
    }

    fn style_severity(&self, severity: &Severity) -> String {
        let text = severity.to_string();
        if !self.color {
            return text;
        }

        match severity.emphasis() {
            Emphasis::Strongest => text.red().bold().to_string(),
            Emphasis::Strong => text.red().to_string(),
            Emphasis::Medium => text.yellow().to_string(),
            Emphasis::Mild => text.green().to_string(),
            Emphasis::Plain => text,
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn alert_table(&self, alerts: &[Alert]) -> Table {
        let mut table = match self.layout {
            TableLayout::Advisory => Table::new(alerts.iter().map(|alert| AdvisoryRow {
                cve_id: or_missing(alert.advisory_id.as_deref()),
                summary: or_missing(Some(alert.summary.as_str())),
                severity: self.style_severity(&alert.severity),
                created: alert.created_on.to_string(),
                url: or_missing(Some(alert.url.as_str())),
            })),
            TableLayout::Package => Table::new(alerts.iter().map(|alert| PackageRow {
                package: or_missing(alert.package.as_deref()),
                severity: self.style_severity(&alert.severity),
                created: alert.created_on.to_string(),
                url: or_missing(Some(alert.url.as_str())),
            })),
        };
        apply_table_style(&mut table);
        table
    }
}

impl ReportFormatter for ConsoleFormatter {
    fn format(&self, results: &[ScanResult]) -> Result<String> {
        if results.is_empty() {
            return Ok(if self.color {
                NO_ALERTS_MESSAGE.green().to_string()
            } else {
                NO_ALERTS_MESSAGE.to_string()
            });
        }

        let mut output = String::new();
        output.push_str(&self.bold("Dependabot Alerts Summary"));
        output.push('\n');
        output.push_str(&format!(
            "Found {} repositories with open alerts\n",
            results.len()
        ));

        for result in results {
            output.push('\n');
            output.push_str(&format!(
                "Repository: {}\n",
                self.bold(&result.repository)
            ));
            output.push_str(&format!("Total Open Alerts: {}\n", result.alert_count));
            output.push_str(&self.alert_table(&result.alerts).to_string());
            output.push('\n');
        }

        Ok(output)
    }

    fn format_disabled(&self, repos: &[Repository]) -> Result<String> {
        if repos.is_empty() {
            return Ok(ALL_ENABLED_MESSAGE.to_string());
        }

        let rows: Vec<DisabledRow> = repos
            .iter()
            .map(|repo| DisabledRow {
                name: repo.full_name.clone(),
                visibility: repo.visibility().to_string(),
                url: or_missing(repo.html_url.as_deref()),
            })
            .collect();

        let mut output = format!(
            "{}\n",
            self.bold(&format!(
                "Repositories without Dependabot alerts enabled ({})",
                repos.len()
            ))
        );

        let mut table = Table::new(&rows);
        apply_table_style(&mut table);
        output.push_str(&table.to_string());

        Ok(output)
    }
}

/// Pretty-printed JSON for scripting.
pub struct JsonFormatter;

#[derive(Serialize)]
struct AlertReport<'a> {
    repositories_with_alerts: usize,
    results: &'a [ScanResult],
}

#[derive(Serialize)]
struct DisabledReport<'a> {
    disabled_repositories: &'a [Repository],
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, results: &[ScanResult]) -> Result<String> {
        serde_json::to_string_pretty(&AlertReport {
            repositories_with_alerts: results.len(),
            results,
        })
        .context("Failed to serialize scan results")
    }

    fn format_disabled(&self, repos: &[Repository]) -> Result<String> {
        serde_json::to_string_pretty(&DisabledReport {
            disabled_repositories: repos,
        })
        .context("Failed to serialize disabled repositories")
    }
}

fn or_missing(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => MISSING.to_string(),
    }
}

fn apply_table_style(table: &mut Table) {
    use tabled::settings::object::Columns;
    use tabled::settings::themes::Theme;
    use tabled::settings::{Modify, Padding};

    let mut theme = Theme::from_style(Style::empty());
    theme.remove_horizontal_lines();
    table.with(theme);
    table.with(Modify::new(Columns::new(..)).with(Padding::new(0, 2, 0, 0)));
}
