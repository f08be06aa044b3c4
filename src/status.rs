//! Per-repository status indicators shown while a scan is running.

use crate::config::ReportMode;
use crate::error::ScanError;
use anyhow::Result;
use dashmap::DashMap;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// How a single repository scan ended.
#[derive(Debug, Clone, Copy)]
pub enum ScanOutcome<'a> {
    Clean,
    Alerts(usize),
    Failed(&'a ScanError),
}

/// Progress feedback for a scan run.
///
/// Implementations must tolerate calls from concurrent scan tasks.
pub trait StatusReporter: Send + Sync {
    /// Free-form progress message.
    fn report(&self, message: &str);

    /// Called once before the first repository is scanned.
    fn begin(&self, total: usize);

    fn start(&self, repo: &str);

    fn finish(&self, repo: &str, outcome: ScanOutcome<'_>);

    /// Called once after the last repository finished.
    fn end(&self);
}

/// Final status line for a repository, or `None` when the indicator
/// should simply disappear.
pub fn outcome_line(mode: ReportMode, repo: &str, outcome: ScanOutcome<'_>) -> Option<String> {
    match outcome {
        ScanOutcome::Clean => match mode {
            ReportMode::Verbose => Some(format!("✓ {repo}")),
            ReportMode::Quiet => None,
        },
        ScanOutcome::Alerts(count) => Some(format!("✗ Found {count} open alerts for {repo}")),
        ScanOutcome::Failed(err) => Some(format!("✗ {repo}: {err}")),
    }
}

/// Spinner-per-repository board drawn on stderr.
pub struct SpinnerBoard {
    mode: ReportMode,
    multi: MultiProgress,
    header: Mutex<Option<ProgressBar>>,
    spinners: DashMap<String, ProgressBar>,
    running_style: ProgressStyle,
    done_style: ProgressStyle,
}

impl SpinnerBoard {
    pub fn new(mode: ReportMode) -> Result<Self> {
        Self::with_draw_target(mode, ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(mode: ReportMode, target: ProgressDrawTarget) -> Result<Self> {
        let running_style = ProgressStyle::with_template("{spinner:.green} {msg}")?;
        let done_style = ProgressStyle::with_template("{msg}")?;

        Ok(Self {
            mode,
            multi: MultiProgress::with_draw_target(target),
            header: Mutex::new(None),
            spinners: DashMap::new(),
            running_style,
            done_style,
        })
    }

    fn spinner(&self, message: String) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.running_style.clone());
        pb.set_message(message);
        pb.enable_steady_tick(TICK_INTERVAL);
        pb
    }

    /// Number of indicators currently spinning.
    pub fn in_flight(&self) -> usize {
        self.spinners.len()
    }
}

impl StatusReporter for SpinnerBoard {
    fn report(&self, message: &str) {
        if self.mode == ReportMode::Quiet {
            return;
        }
        if let Err(e) = self.multi.println(message) {
            tracing::debug!("Failed to print status message: {}", e);
        }
    }

    fn begin(&self, total: usize) {
        if self.mode == ReportMode::Quiet {
            return;
        }
        let header = self.spinner(format!("Scanning {total} repositories"));
        if let Ok(mut slot) = self.header.lock() {
            *slot = Some(header);
        }
    }

    fn start(&self, repo: &str) {
        let pb = self.spinner(format!("Scanning {repo}"));
        self.spinners.insert(repo.to_string(), pb);
    }

    fn finish(&self, repo: &str, outcome: ScanOutcome<'_>) {
        let Some((_, pb)) = self.spinners.remove(repo) else {
            return;
        };

        match outcome_line(self.mode, repo, outcome) {
            Some(line) => {
                pb.set_style(self.done_style.clone());
                pb.finish_with_message(line);
            }
            None => pb.finish_and_clear(),
        }
    }

    fn end(&self) {
        if let Ok(mut slot) = self.header.lock()
            && let Some(header) = slot.take()
        {
            header.finish_and_clear();
        }

        // Anything still registered was never finished; drop it quietly.
        if self.in_flight() > 0 {
            tracing::debug!("Clearing {} unfinished indicators", self.in_flight());
        }
        let leftovers: Vec<String> = self.spinners.iter().map(|e| e.key().clone()).collect();
        for repo in leftovers {
            if let Some((_, pb)) = self.spinners.remove(&repo) {
                pb.finish_and_clear();
            }
        }
    }
}
