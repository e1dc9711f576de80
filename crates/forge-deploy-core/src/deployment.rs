//! Site deployment lifecycle
//!
//! ```text
//! Idle --trigger--> Queued --(status leaves "queued")--> Deploying
//! Deploying --(status leaves "deploying")--> Succeeded | Failed
//! ```
//!
//! Polling has no iteration bound: the remote side is the source of truth.
//! Callers that want a bound set [`Deployer::with_timeout`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ForgeError, Result};
use crate::forge::{DeploymentApi, DeploymentRecord, Site};

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_DEPLOYING: &str = "deploying";
pub const STATUS_FAILED: &str = "failed";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Terminal classification of a deployment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// Where an in-flight deployment currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Queued,
    Deploying,
    Succeeded,
    Failed,
}

impl From<Outcome> for SessionStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Succeeded => SessionStatus::Succeeded,
            Outcome::Failed => SessionStatus::Failed,
        }
    }
}

/// In-memory state of one deployment; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentSession {
    pub server_id: u64,
    pub site_id: u64,
    pub deployment_id: Option<u64>,
    pub status: SessionStatus,
}

/// Progress notifications emitted by [`Deployer::deploy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentPhase {
    Queuing,
    WaitingForStart,
    Deploying,
    Finished(Outcome),
}

/// Receives progress while a deployment runs
pub trait DeploymentObserver {
    fn phase(&mut self, _phase: DeploymentPhase) {}

    /// Called with the full log once the deployment has finished
    fn output(&mut self, _lines: &[String]) {}
}

impl DeploymentObserver for () {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentSummary {
    pub deployment_id: u64,
    pub site_url: String,
    /// `ended_at - started_at` as reported remotely
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub session: DeploymentSession,
    pub record: DeploymentRecord,
    pub summary: DeploymentSummary,
    pub output: Vec<String>,
}

/// Anything but `failed` counts as success
pub fn classify(record: &DeploymentRecord) -> Outcome {
    if record.status == STATUS_FAILED {
        Outcome::Failed
    } else {
        Outcome::Succeeded
    }
}

pub fn summarize(record: &DeploymentRecord, site: &Site) -> DeploymentSummary {
    DeploymentSummary {
        deployment_id: record.id,
        site_url: site.url(),
        duration_seconds: elapsed_seconds(record.started_at.as_deref(), record.ended_at.as_deref()),
    }
}

/// Seconds between two remote timestamps; no local clock involved
pub fn elapsed_seconds(started_at: Option<&str>, ended_at: Option<&str>) -> Option<i64> {
    let started = parse_timestamp(started_at?)?;
    let ended = parse_timestamp(ended_at?)?;
    Some((ended - started).num_seconds())
}

/// Forge timestamps are either RFC 3339 or `YYYY-MM-DD HH:MM:SS` in UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

pub fn split_output(output: &str) -> Vec<String> {
    output.lines().map(str::to_string).collect()
}

/// Drives one site deployment through its remote lifecycle
pub struct Deployer<'a, A> {
    api: &'a A,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl<'a, A: DeploymentApi> Deployer<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound the wait for start and completion
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read the site and refuse if a deployment is already in flight
    pub async fn ensure_idle(&self, server_id: u64, site_id: u64) -> Result<Site> {
        let site = self.api.site(server_id, site_id).await?;

        if let Some(status) = site.deployment_status.as_deref().filter(|s| !s.is_empty()) {
            debug!("Site {} reports deployment status {}", site_id, status);
            return Err(ForgeError::AlreadyDeploying { site: site_id });
        }

        Ok(site)
    }

    /// Queue a deployment once the site is known to be idle
    pub async fn trigger(&self, server_id: u64, site_id: u64) -> Result<Site> {
        let site = self.ensure_idle(server_id, site_id).await?;

        self.api.start_deployment(server_id, site_id).await?;
        info!("Queued deployment of {} (server {}, site {})", site.name, server_id, site_id);

        Ok(site)
    }

    /// Wait until the site leaves `queued`, then return the newest deployment id
    pub async fn await_start(&self, server_id: u64, site_id: u64) -> Result<u64> {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let status = self.api.site(server_id, site_id).await?.deployment_status;
            debug!("Site {} deployment status: {:?}", site_id, status);

            if status.as_deref() != Some(STATUS_QUEUED) {
                break;
            }
        }

        let latest = self
            .api
            .deployments(server_id, site_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ForgeError::General(anyhow::anyhow!(
                    "Site {} has no deployment history after starting a deployment",
                    site_id
                ))
            })?;

        info!("Deployment {} started", latest.id);
        Ok(latest.id)
    }

    /// Wait until the deployment record leaves `deploying`
    pub async fn await_completion(
        &self,
        server_id: u64,
        site_id: u64,
        deployment_id: u64,
    ) -> Result<DeploymentRecord> {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let record = self.api.deployment(server_id, site_id, deployment_id).await?;
            debug!("Deployment {} status: {}", deployment_id, record.status);

            if record.status != STATUS_DEPLOYING {
                info!("Deployment {} finished with status {}", deployment_id, record.status);
                return Ok(record);
            }
        }
    }

    pub async fn fetch_output(
        &self,
        server_id: u64,
        site_id: u64,
        deployment_id: u64,
    ) -> Result<Vec<String>> {
        let output = self
            .api
            .deployment_output(server_id, site_id, deployment_id)
            .await?;
        Ok(split_output(&output))
    }

    /// Run the whole lifecycle.
    ///
    /// The log is handed to `observer` before a failed deployment is
    /// reported as [`ForgeError::DeploymentFailed`].
    pub async fn deploy<O: DeploymentObserver>(
        &self,
        server_id: u64,
        site_id: u64,
        observer: &mut O,
    ) -> Result<DeploymentReport> {
        observer.phase(DeploymentPhase::Queuing);
        let site = self.trigger(server_id, site_id).await?;

        let mut session = DeploymentSession {
            server_id,
            site_id,
            deployment_id: None,
            status: SessionStatus::Queued,
        };

        observer.phase(DeploymentPhase::WaitingForStart);
        let wait = async {
            let deployment_id = self.await_start(server_id, site_id).await?;
            session.deployment_id = Some(deployment_id);
            session.status = SessionStatus::Deploying;
            observer.phase(DeploymentPhase::Deploying);

            self.await_completion(server_id, site_id, deployment_id).await
        };

        let record = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| ForgeError::Timeout {
                    after_secs: limit.as_secs(),
                })??,
            None => wait.await?,
        };

        let output = self.fetch_output(server_id, site_id, record.id).await?;
        observer.output(&output);

        let outcome = classify(&record);
        session.status = outcome.into();
        observer.phase(DeploymentPhase::Finished(outcome));

        if outcome == Outcome::Failed {
            return Err(ForgeError::DeploymentFailed {
                deployment_id: record.id,
            });
        }

        let summary = summarize(&record, &site);
        Ok(DeploymentReport {
            session,
            record,
            summary,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted remote: each read pops the next value, repeating the last one
    struct FakeApi {
        site_statuses: Mutex<VecDeque<Option<&'static str>>>,
        records: Mutex<VecDeque<DeploymentRecord>>,
        history: Vec<DeploymentRecord>,
        output: String,
        starts: Mutex<u32>,
    }

    impl FakeApi {
        fn new(site_statuses: &[Option<&'static str>], records: Vec<DeploymentRecord>) -> Self {
            Self {
                site_statuses: Mutex::new(site_statuses.iter().copied().collect()),
                history: records.iter().rev().take(1).cloned().collect(),
                records: Mutex::new(records.into()),
                output: "Cloning repository\nRunning build\nDone".to_string(),
                starts: Mutex::new(0),
            }
        }

        fn start_count(&self) -> u32 {
            *self.starts.lock().unwrap()
        }
    }

    fn next_or_last<T: Clone>(queue: &Mutex<VecDeque<T>>) -> T {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }

    impl DeploymentApi for FakeApi {
        async fn site(&self, _server_id: u64, site_id: u64) -> Result<Site> {
            Ok(Site {
                id: site_id,
                name: "example.com".to_string(),
                deployment_status: next_or_last(&self.site_statuses).map(str::to_string),
            })
        }

        async fn start_deployment(&self, _server_id: u64, _site_id: u64) -> Result<()> {
            *self.starts.lock().unwrap() += 1;
            Ok(())
        }

        async fn deployments(&self, _server_id: u64, _site_id: u64) -> Result<Vec<DeploymentRecord>> {
            Ok(self.history.clone())
        }

        async fn deployment(&self, _: u64, _: u64, _: u64) -> Result<DeploymentRecord> {
            Ok(next_or_last(&self.records))
        }

        async fn deployment_output(&self, _: u64, _: u64, _: u64) -> Result<String> {
            Ok(self.output.clone())
        }
    }

    #[derive(Default)]
    struct Recorder {
        phases: Vec<DeploymentPhase>,
        lines: Vec<String>,
    }

    impl DeploymentObserver for Recorder {
        fn phase(&mut self, phase: DeploymentPhase) {
            self.phases.push(phase);
        }

        fn output(&mut self, lines: &[String]) {
            self.lines = lines.to_vec();
        }
    }

    fn record(status: &str, started_at: Option<&str>, ended_at: Option<&str>) -> DeploymentRecord {
        DeploymentRecord {
            id: 42,
            status: status.to_string(),
            started_at: started_at.map(str::to_string),
            ended_at: ended_at.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_only_failed_is_failure() {
        assert_eq!(classify(&record("failed", None, None)), Outcome::Failed);
        assert_eq!(classify(&record("finished", None, None)), Outcome::Succeeded);
        assert_eq!(classify(&record("cancelled", None, None)), Outcome::Succeeded);
        assert_eq!(classify(&record("", None, None)), Outcome::Succeeded);
    }

    #[test]
    fn test_elapsed_seconds_from_remote_timestamps() {
        assert_eq!(
            elapsed_seconds(Some("2024-03-01 10:00:00"), Some("2024-03-01 10:00:42")),
            Some(42)
        );
        assert_eq!(
            elapsed_seconds(Some("2024-03-01T10:00:00Z"), Some("2024-03-01T10:01:00.000000Z")),
            Some(60)
        );
        assert_eq!(elapsed_seconds(Some("2024-03-01 10:00:00"), None), None);
        assert_eq!(elapsed_seconds(Some("yesterday"), Some("2024-03-01 10:00:00")), None);
    }

    #[test]
    fn test_split_output() {
        assert_eq!(split_output("a\nb\r\nc"), vec!["a", "b", "c"]);
        assert!(split_output("").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_deploying_site_is_never_triggered() {
        let api = FakeApi::new(&[Some("deploying")], vec![record("deploying", None, None)]);
        let deployer = Deployer::new(&api);

        let result = deployer.deploy(1, 10, &mut ()).await;

        assert!(matches!(result, Err(ForgeError::AlreadyDeploying { site: 10 })));
        assert_eq!(api.start_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_deployment_reports_elapsed_time() {
        let api = FakeApi::new(
            &[None, Some("queued"), Some("queued"), Some("deploying")],
            vec![
                record("deploying", Some("2024-03-01 10:00:00"), None),
                record("deploying", Some("2024-03-01 10:00:00"), None),
                record("finished", Some("2024-03-01 10:00:00"), Some("2024-03-01 10:00:42")),
            ],
        );
        let deployer = Deployer::new(&api);
        let mut recorder = Recorder::default();

        let report = deployer.deploy(1, 10, &mut recorder).await.unwrap();

        assert_eq!(api.start_count(), 1);
        assert_eq!(report.summary.deployment_id, 42);
        assert_eq!(report.summary.duration_seconds, Some(42));
        assert_eq!(report.summary.site_url, "https://example.com");
        assert_eq!(report.session.status, SessionStatus::Succeeded);
        assert_eq!(report.session.deployment_id, Some(42));
        assert_eq!(
            recorder.phases,
            vec![
                DeploymentPhase::Queuing,
                DeploymentPhase::WaitingForStart,
                DeploymentPhase::Deploying,
                DeploymentPhase::Finished(Outcome::Succeeded),
            ]
        );
        assert_eq!(recorder.lines.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_start_polls_until_status_leaves_queued() {
        let api = FakeApi::new(
            &[Some("queued"), Some("queued"), Some("deploying")],
            vec![record("deploying", None, None)],
        );
        let deployer = Deployer::new(&api);
        let begin = tokio::time::Instant::now();

        let id = deployer.await_start(1, 10).await.unwrap();

        assert_eq!(id, 42);
        let waited = begin.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_deployment_shows_output_then_fails() {
        let api = FakeApi::new(
            &[None, Some("deploying")],
            vec![record("failed", Some("2024-03-01 10:00:00"), Some("2024-03-01 10:00:05"))],
        );
        let deployer = Deployer::new(&api);
        let mut recorder = Recorder::default();

        let result = deployer.deploy(1, 10, &mut recorder).await;

        assert!(matches!(result, Err(ForgeError::DeploymentFailed { deployment_id: 42 })));
        assert_eq!(recorder.lines, vec!["Cloning repository", "Running build", "Done"]);
        assert_eq!(
            recorder.phases.last(),
            Some(&DeploymentPhase::Finished(Outcome::Failed))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds_the_wait() {
        let api = FakeApi::new(&[None, Some("queued")], vec![record("deploying", None, None)]);
        let deployer = Deployer::new(&api)
            .with_poll_interval(Duration::from_secs(2))
            .with_timeout(Some(Duration::from_secs(30)));

        let result = deployer.deploy(1, 10, &mut ()).await;

        assert!(matches!(result, Err(ForgeError::Timeout { after_secs: 30 })));
        assert_eq!(api.start_count(), 1);
    }
}
