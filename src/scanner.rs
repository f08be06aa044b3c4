use crate::error::ScanError;
use crate::github::AlertPlatform;
use crate::models::{Classification, Repository, ScanResult, ScanRun};
use crate::status::{ScanOutcome, StatusReporter};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Split repositories by whether Dependabot alerts are enabled.
///
/// Both output lists keep input order. A failed capability query counts
/// the repository as disabled.
pub async fn classify(platform: &dyn AlertPlatform, repos: Vec<Repository>) -> Classification {
    let mut classification = Classification::default();

    for repo in repos {
        match platform.vulnerability_alerts_enabled(&repo).await {
            Ok(true) => classification.enabled.push(repo),
            Ok(false) => classification.disabled.push(repo),
            Err(e) => {
                warn!(
                    repository = %repo.full_name,
                    error = %e,
                    "Failed to read vulnerability alerts setting, treating as disabled"
                );
                classification.disabled.push(repo);
            }
        }
    }

    info!(
        enabled = classification.enabled.len(),
        disabled = classification.disabled.len(),
        "Repositories classified"
    );

    classification
}

/// Fetch open alerts for one repository. `Ok(None)` means a clean scan.
pub async fn fetch_alerts(
    platform: &dyn AlertPlatform,
    repo: &Repository,
) -> Result<Option<ScanResult>, ScanError> {
    debug!("Scanning repository: {}", repo.full_name);
    let alerts = platform.open_alerts(repo).await?;
    Ok(ScanResult::new(repo.full_name.clone(), alerts))
}

pub struct Scanner {
    platform: Arc<dyn AlertPlatform>,
    status: Arc<dyn StatusReporter>,
    concurrent_scans: usize,
}

impl Scanner {
    pub fn new(
        platform: Arc<dyn AlertPlatform>,
        status: Arc<dyn StatusReporter>,
        concurrent_scans: usize,
    ) -> Self {
        Self {
            platform,
            status,
            concurrent_scans: concurrent_scans.max(1),
        }
    }

    pub async fn classify(&self, repos: Vec<Repository>) -> Classification {
        classify(self.platform.as_ref(), repos).await
    }

    /// Classify the repositories, then scan every enabled one.
    ///
    /// A failing repository is reported and skipped; the run always completes.
    pub async fn run(&self, repos: Vec<Repository>) -> ScanRun {
        let start_time = Instant::now();
        let total_repos = repos.len();

        let Classification { enabled, disabled } = self.classify(repos).await;
        let enabled_repos = enabled.len();

        info!(
            "Scanning {} repositories (disabled: {})",
            enabled_repos,
            disabled.len()
        );

        self.status.begin(enabled_repos);
        let (results, failed_repos, max_concurrent) = self.scan_concurrently(enabled).await;
        self.status.end();

        let run = ScanRun {
            results,
            total_repos,
            enabled_repos,
            disabled_repos: disabled.len(),
            failed_repos,
            max_concurrent_scans: max_concurrent,
            scan_duration: start_time.elapsed(),
        };

        info!(
            repositories_with_alerts = run.results.len(),
            total_alerts = run.total_alerts(),
            failed = run.failed_repos,
            "Scan completed in {:?}",
            run.scan_duration
        );

        run
    }

    async fn scan_concurrently(&self, repos: Vec<Repository>) -> (Vec<ScanResult>, usize, usize) {
        let semaphore = Arc::new(Semaphore::new(self.concurrent_scans));
        let active_scans = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::with_capacity(repos.len());

        for repo in repos {
            let semaphore = Arc::clone(&semaphore);
            let active = Arc::clone(&active_scans);
            let max_conc = Arc::clone(&max_concurrent);
            let platform = Arc::clone(&self.platform);
            let status = Arc::clone(&self.status);
            let repo_name = repo.full_name.clone();

            let task = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();

                let current = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_conc.fetch_max(current, Ordering::SeqCst);

                status.start(&repo.full_name);
                let result = fetch_alerts(platform.as_ref(), &repo).await;
                let outcome = match &result {
                    Ok(Some(found)) => ScanOutcome::Alerts(found.alert_count),
                    Ok(None) => ScanOutcome::Clean,
                    Err(e) => ScanOutcome::Failed(e),
                };
                status.finish(&repo.full_name, outcome);

                active.fetch_sub(1, Ordering::SeqCst);
                result
            });

            tasks.push((repo_name, task));
        }

        // Awaiting in spawn order keeps results in repository order.
        let mut results = Vec::new();
        let mut failed = 0;
        for (repo_name, task) in tasks {
            match task.await {
                Ok(Ok(Some(result))) => results.push(result),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(
                        repository = %repo_name,
                        error = %e,
                        detail = e.detail().unwrap_or_default(),
                        "Repository scan failed"
                    );
                }
                Err(e) => {
                    failed += 1;
                    warn!(repository = %repo_name, "Task join error: {}", e);
                }
            }
        }

        (results, failed, max_concurrent.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alert, sample_alert};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakePlatform {
        capabilities: HashMap<u64, Result<bool, ScanError>>,
        alerts: HashMap<String, Result<Vec<Alert>, ScanError>>,
        delay: Option<Duration>,
    }

    impl FakePlatform {
        fn with_repo(
            mut self,
            repo: &Repository,
            enabled: Result<bool, ScanError>,
            alerts: Result<Vec<Alert>, ScanError>,
        ) -> Self {
            self.capabilities.insert(repo.id, enabled);
            self.alerts.insert(repo.full_name.clone(), alerts);
            self
        }
    }

    #[async_trait]
    impl AlertPlatform for FakePlatform {
        async fn authenticated_login(&self) -> Result<String, ScanError> {
            Ok("octocat".to_string())
        }

        async fn list_repositories(&self) -> Result<Vec<Repository>, ScanError> {
            Ok(Vec::new())
        }

        async fn vulnerability_alerts_enabled(&self, repo: &Repository) -> Result<bool, ScanError> {
            self.capabilities
                .get(&repo.id)
                .cloned()
                .unwrap_or(Ok(false))
        }

        async fn open_alerts(&self, repo: &Repository) -> Result<Vec<Alert>, ScanError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.alerts
                .get(&repo.full_name)
                .cloned()
                .unwrap_or(Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct RecordingStatus {
        events: Mutex<Vec<String>>,
    }

    impl RecordingStatus {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl StatusReporter for RecordingStatus {
        fn report(&self, message: &str) {
            self.events.lock().unwrap().push(format!("report {message}"));
        }

        fn begin(&self, total: usize) {
            self.events.lock().unwrap().push(format!("begin {total}"));
        }

        fn start(&self, repo: &str) {
            self.events.lock().unwrap().push(format!("start {repo}"));
        }

        fn finish(&self, repo: &str, outcome: ScanOutcome<'_>) {
            let label = match outcome {
                ScanOutcome::Clean => "clean".to_string(),
                ScanOutcome::Alerts(n) => format!("alerts {n}"),
                ScanOutcome::Failed(e) => format!("failed {e}"),
            };
            self.events.lock().unwrap().push(format!("finish {repo} {label}"));
        }

        fn end(&self) {
            self.events.lock().unwrap().push("end".to_string());
        }
    }

    fn repo(id: u64, name: &str) -> Repository {
        Repository::new(id, name)
    }

    fn scanner(platform: FakePlatform, concurrent_scans: usize) -> (Scanner, Arc<RecordingStatus>) {
        let status = Arc::new(RecordingStatus::default());
        let scanner = Scanner::new(Arc::new(platform), status.clone(), concurrent_scans);
        (scanner, status)
    }

    #[tokio::test]
    async fn test_classify_partitions_in_input_order() {
        let (a, b, c) = (repo(1, "acme/a"), repo(2, "acme/b"), repo(3, "acme/c"));
        let platform = FakePlatform::default()
            .with_repo(&a, Ok(true), Ok(vec![]))
            .with_repo(&b, Ok(false), Ok(vec![]))
            .with_repo(&c, Ok(true), Ok(vec![]));

        let classification = classify(&platform, vec![a.clone(), b.clone(), c.clone()]).await;

        assert_eq!(classification.enabled, vec![a, c]);
        assert_eq!(classification.disabled, vec![b]);
    }

    #[tokio::test]
    async fn test_classify_is_disjoint_and_exhaustive() {
        let repos: Vec<Repository> = (1..=6).map(|i| repo(i, &format!("acme/r{i}"))).collect();
        let mut platform = FakePlatform::default();
        for r in &repos {
            let capability = match r.id % 3 {
                0 => Err(ScanError::Other("boom".to_string())),
                1 => Ok(true),
                _ => Ok(false),
            };
            platform = platform.with_repo(r, capability, Ok(vec![]));
        }

        let classification = classify(&platform, repos.clone()).await;

        assert_eq!(
            classification.enabled.len() + classification.disabled.len(),
            repos.len()
        );
        for r in &repos {
            let in_enabled = classification.enabled.contains(r);
            let in_disabled = classification.disabled.contains(r);
            assert!(in_enabled ^ in_disabled, "{} must be in exactly one set", r.full_name);
        }
    }

    #[tokio::test]
    async fn test_classify_failure_counts_as_disabled() {
        let r = repo(1, "acme/locked");
        let platform = FakePlatform::default().with_repo(
            &r,
            Err(ScanError::Unauthorized {
                message: "Bad credentials".to_string(),
            }),
            Ok(vec![]),
        );

        let classification = classify(&platform, vec![r.clone()]).await;
        assert!(classification.enabled.is_empty());
        assert_eq!(classification.disabled, vec![r]);
    }

    #[tokio::test]
    async fn test_fetch_alerts_returns_none_for_clean_repository() {
        let r = repo(1, "acme/clean");
        let platform = FakePlatform::default().with_repo(&r, Ok(true), Ok(vec![]));

        assert_eq!(fetch_alerts(&platform, &r).await, Ok(None));
    }

    #[tokio::test]
    async fn test_fetch_alerts_builds_result() {
        let d = repo(4, "acme/d");
        let platform = FakePlatform::default().with_repo(
            &d,
            Ok(true),
            Ok(vec![sample_alert("CVE-1", "high"), sample_alert("CVE-2", "low")]),
        );

        let result = fetch_alerts(&platform, &d).await.unwrap().unwrap();

        assert_eq!(result.repository, "acme/d");
        assert_eq!(result.alert_count, 2);
        assert_eq!(result.alerts.len(), 2);
        assert_eq!(result.alerts[0].advisory_id.as_deref(), Some("CVE-1"));
        assert_eq!(result.alerts[0].severity.to_string(), "high");
        assert_eq!(result.alerts[1].advisory_id.as_deref(), Some("CVE-2"));
        assert_eq!(result.alerts[1].severity.to_string(), "low");
    }

    #[tokio::test]
    async fn test_fetch_alerts_propagates_not_found() {
        let e = repo(5, "acme/e");
        let platform =
            FakePlatform::default().with_repo(&e, Ok(true), Err(ScanError::NotFound));

        assert_eq!(fetch_alerts(&platform, &e).await, Err(ScanError::NotFound));
    }

    #[tokio::test]
    async fn test_run_continues_after_not_found() {
        let e = repo(5, "acme/e");
        let next = repo(6, "acme/next");
        let platform = FakePlatform::default()
            .with_repo(&e, Ok(true), Err(ScanError::NotFound))
            .with_repo(&next, Ok(true), Ok(vec![sample_alert("CVE-9", "medium")]));

        let (scanner, status) = scanner(platform, 1);
        let run = scanner.run(vec![e, next]).await;

        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].repository, "acme/next");
        assert_eq!(run.failed_repos, 1);
        assert!(status.events().contains(
            &"finish acme/e failed Repository not found or no access to security alerts"
                .to_string()
        ));
    }

    #[tokio::test]
    async fn test_run_isolates_failures() {
        let f = repo(1, "acme/f");
        let g = repo(2, "acme/g");
        let h = repo(3, "acme/h");
        let platform = FakePlatform::default()
            .with_repo(&f, Ok(true), Ok(vec![sample_alert("CVE-1", "critical")]))
            .with_repo(&g, Ok(true), Ok(vec![]))
            .with_repo(
                &h,
                Ok(true),
                Err(ScanError::Unauthorized {
                    message: "Bad credentials".to_string(),
                }),
            );

        let (scanner, status) = scanner(platform, 1);
        let run = scanner.run(vec![f, g, h]).await;

        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].repository, "acme/f");
        assert_eq!(run.total_repos, 3);
        assert_eq!(run.enabled_repos, 3);
        assert_eq!(run.disabled_repos, 0);
        assert_eq!(run.failed_repos, 1);
        assert_eq!(
            status.events(),
            vec![
                "begin 3".to_string(),
                "start acme/f".to_string(),
                "finish acme/f alerts 1".to_string(),
                "start acme/g".to_string(),
                "finish acme/g clean".to_string(),
                "start acme/h".to_string(),
                "finish acme/h failed Unauthorized - check your GitHub token permissions"
                    .to_string(),
                "end".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_skips_disabled_repositories() {
        let on = repo(1, "acme/on");
        let off = repo(2, "acme/off");
        let platform = FakePlatform::default()
            .with_repo(&on, Ok(true), Ok(vec![sample_alert("CVE-1", "low")]))
            .with_repo(&off, Ok(false), Ok(vec![sample_alert("CVE-2", "low")]));

        let (scanner, status) = scanner(platform, 1);
        let run = scanner.run(vec![on, off]).await;

        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].repository, "acme/on");
        assert_eq!(run.disabled_repos, 1);
        assert!(!status.events().iter().any(|e| e.contains("acme/off")));
    }

    #[tokio::test]
    async fn test_concurrent_run_preserves_repository_order() {
        let repos: Vec<Repository> = (1..=8).map(|i| repo(i, &format!("acme/r{i}"))).collect();
        let mut platform = FakePlatform {
            delay: Some(Duration::from_millis(20)),
            ..FakePlatform::default()
        };
        for r in &repos {
            let id = format!("CVE-{}", r.id);
            platform = platform.with_repo(r, Ok(true), Ok(vec![sample_alert(&id, "high")]));
        }

        let (scanner, _status) = scanner(platform, 4);
        let run = scanner.run(repos.clone()).await;

        let names: Vec<&str> = run.results.iter().map(|r| r.repository.as_str()).collect();
        let expected: Vec<&str> = repos.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, expected);
        assert!(run.max_concurrent_scans <= 4);
        assert!(run.max_concurrent_scans >= 1);
    }

    #[tokio::test]
    async fn test_run_with_no_repositories() {
        let (scanner, status) = scanner(FakePlatform::default(), 1);
        let run = scanner.run(vec![]).await;

        assert!(run.results.is_empty());
        assert_eq!(run.total_repos, 0);
        assert_eq!(status.events(), vec!["begin 0".to_string(), "end".to_string()]);
    }
}
