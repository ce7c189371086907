use std::sync::Arc;

use anyhow::{bail, Context};
use lists_jobs_core::{
    HttpJobClient, JobApi, JobEventHandler, JobTracker, LifecycleError, TrackerSnapshot,
    TrackerState,
};
use lists_jobs_types::{JobKind, JobRecord};
use tracing::{error, info, warn};

use crate::args::{Cli, Command};

/// How a command ended.
#[derive(Debug)]
pub enum Outcome {
    Finished(TrackerSnapshot),
    /// Nothing to follow: the list had no job running.
    NothingRunning,
    /// Interrupted by the operator. The job keeps running on the server.
    Detached,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Finished(snap) => match snap.state {
                TrackerState::Succeeded | TrackerState::Cancelled => 0,
                _ => 1,
            },
            Self::NothingRunning => 0,
            Self::Detached => 130,
        }
    }
}

/// Logs each lifecycle event as it fires.
struct LogEvents;

impl JobEventHandler for LogEvents {
    fn on_success(&mut self, record: &JobRecord) {
        info!(
            job_id = %record.id(),
            records = ?record.record_count(),
            content_version = ?record.content_version(),
            "job succeeded"
        );
    }

    fn on_error(&mut self, error: &LifecycleError) {
        error!(%error, "job failed");
    }

    fn on_polling_error(&mut self, error: &LifecycleError) {
        error!(%error, "lost track of job");
    }

    fn on_cancel_success(&mut self, record: &JobRecord) {
        info!(job_id = %record.id(), "job cancelled");
    }

    fn on_cancel_error(&mut self, error: &LifecycleError) {
        warn!(%error, "cancel did not take effect");
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let client = HttpJobClient::new(&cli.connection.client_config())
        .context("failed to build list service client")?;
    let api: Arc<dyn JobApi> = Arc::new(client);
    let list_id = cli.command.list_id().to_string();
    let kind = cli.command.kind();
    let builder =
        JobTracker::builder(list_id.as_str(), kind).config(cli.connection.tracker_config());

    let tracker = match &cli.command {
        Command::Refresh { .. } | Command::Export { .. } => {
            let tracker = builder.spawn(api, LogEvents);
            let record = tracker.start().await?;
            info!(%list_id, %kind, job_id = %record.id(), "job accepted");
            tracker
        }
        Command::Watch { job_id: Some(job_id), .. } => {
            let record = api
                .job_status(&list_id, kind, job_id)
                .await
                .with_context(|| format!("failed to look up {kind} job {job_id}"))?;
            let baseline = refresh_baseline(api.as_ref(), &list_id, kind).await;
            builder
                .content_version(baseline)
                .seed(Some(record))
                .spawn(api, LogEvents)
        }
        Command::Watch { job_id: None, .. } => {
            if kind != JobKind::Refresh {
                bail!("watching an export needs --job-id");
            }
            let details = api
                .list_details(&list_id)
                .await
                .with_context(|| format!("failed to load list {list_id}"))?;
            if details.in_progress_refresh.is_none() {
                info!(%list_id, "no refresh in progress");
                return Ok(Outcome::NothingRunning);
            }
            builder.from_details(&details).spawn(api, LogEvents)
        }
        Command::Cancel { job_id, .. } => {
            let record = api
                .job_status(&list_id, kind, job_id)
                .await
                .with_context(|| format!("failed to look up {kind} job {job_id}"))?;
            let baseline = refresh_baseline(api.as_ref(), &list_id, kind).await;
            let tracker = builder
                .content_version(baseline)
                .seed(Some(record))
                .spawn(api, LogEvents);
            if let Err(e) = tracker.cancel().await {
                warn!(%e, "cancel not sent");
            }
            tracker
        }
    };

    if tracker.state() == TrackerState::Idle {
        return Ok(Outcome::NothingRunning);
    }

    tokio::select! {
        snap = tracker.wait_for(|s| s.state.is_terminal()) => Ok(Outcome::Finished(snap?)),
        _ = tokio::signal::ctrl_c() => {
            info!(%list_id, %kind, "detaching, the job keeps running on the server");
            tracker.shutdown().await;
            Ok(Outcome::Detached)
        }
    }
}

/// Content version of the list's last successful refresh, the staleness
/// baseline for a refresh followed by id. Exports have none.
async fn refresh_baseline(api: &dyn JobApi, list_id: &str, kind: JobKind) -> Option<u64> {
    if kind != JobKind::Refresh {
        return None;
    }
    match api.list_details(list_id).await {
        Ok(details) => details.content_version(),
        Err(e) => {
            warn!(%list_id, error = %e, "could not load list details, following without a version baseline");
            None
        }
    }
}

/// One-line summary for stdout.
pub fn summary(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Finished(snap) => {
            let job = snap.current_job.as_ref().map(JobRecord::id).unwrap_or("-");
            match &snap.last_error {
                Some(error) => format!("{} job {job} {}: {error}", snap.kind, snap.state),
                None => format!("{} job {job} {}", snap.kind, snap.state),
            }
        }
        Outcome::NothingRunning => "no job running".to_string(),
        Outcome::Detached => "detached".to_string(),
    }
}
