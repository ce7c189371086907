// crates/core/src/tracker.rs
//! Poll driver for a single refresh or export job.
//!
//! Each `JobTracker` spawns one tokio task that owns a [`JobMachine`].
//! Host commands arrive over an mpsc channel, snapshots leave over a watch
//! channel, and events go to the injected [`JobEventHandler`]. At most one
//! request is outstanding at a time, so responses are applied in the order
//! their requests were issued and polls never pile up on a slow network.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use lists_jobs_types::{JobKind, JobRecord, ListDetails};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::client::JobApi;
use crate::config::TrackerConfig;
use crate::error::{LifecycleError, TrackerError};
use crate::events::{dispatch, JobEventHandler, TrackerEvent};
use crate::machine::{
    Effect, JobMachine, MachineEvent, PollDelay, TrackerSnapshot, TrackerState,
};

type Reply<T> = oneshot::Sender<Result<T, TrackerError>>;

type PendingRequest = Pin<Box<dyn Future<Output = MachineEvent> + Send>>;

enum Command {
    Start(Reply<JobRecord>),
    Cancel(Reply<()>),
    Reconcile(JobRecord, Reply<()>),
}

/// Configures and spawns a [`JobTracker`].
pub struct TrackerBuilder {
    list_id: String,
    kind: JobKind,
    config: TrackerConfig,
    seed: Option<JobRecord>,
    content_version: Option<u64>,
}

impl TrackerBuilder {
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Job already known to the host. In-progress seeds start polling at
    /// once without a start request.
    pub fn seed(mut self, record: Option<JobRecord>) -> Self {
        self.seed = record;
        self
    }

    pub fn content_version(mut self, version: Option<u64>) -> Self {
        self.content_version = version;
        self
    }

    /// Seed a refresh tracker from freshly loaded list details.
    pub fn from_details(mut self, details: &ListDetails) -> Self {
        if self.kind == JobKind::Refresh {
            self.seed = details.in_progress_refresh.clone();
            self.content_version = details.content_version();
        }
        self
    }

    /// Spawn the tracker task. Must be called inside a tokio runtime.
    pub fn spawn(self, api: Arc<dyn JobApi>, handler: impl JobEventHandler) -> JobTracker {
        let machine =
            JobMachine::new(self.list_id, self.kind).with_content_version(self.content_version);
        let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());
        let (command_tx, command_rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();

        let mut driver = Driver {
            machine,
            api,
            handler: Box::new(handler),
            poll_interval: self.config.poll_interval,
            snapshots: snapshot_tx,
            next_poll: None,
            pending: None,
            start_reply: None,
        };
        if let Some(seed) = self.seed {
            driver.apply(MachineEvent::Reconcile(seed));
        }

        let task = tokio::spawn(driver.run(command_rx, shutdown.clone()));

        JobTracker {
            commands: command_tx,
            snapshots: snapshot_rx,
            shutdown,
            task: Some(task),
        }
    }
}

/// Handle to a running tracker.
///
/// Dropping the handle (or calling [`JobTracker::shutdown`]) stops the poll
/// loop immediately. It never cancels the job on the server: other viewers
/// of the same list may still be waiting on it.
pub struct JobTracker {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<TrackerSnapshot>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl JobTracker {
    pub fn builder(list_id: impl Into<String>, kind: JobKind) -> TrackerBuilder {
        TrackerBuilder {
            list_id: list_id.into(),
            kind,
            config: TrackerConfig::default(),
            seed: None,
            content_version: None,
        }
    }

    /// Start a new job and wait for the service to accept it.
    ///
    /// Rejected while a job is active. A failed start request returns the
    /// tracker to idle, fires `on_error`, and comes back as
    /// [`TrackerError::Lifecycle`].
    pub async fn start(&self) -> Result<JobRecord, TrackerError> {
        self.request(Command::Start).await
    }

    /// Ask the service to cancel the current job. Only valid while polling.
    /// The outcome arrives as an event once the service answers.
    pub async fn cancel(&self) -> Result<(), TrackerError> {
        self.request(Command::Cancel).await
    }

    /// Inject a job record fetched elsewhere.
    pub async fn reconcile(&self, record: JobRecord) -> Result<(), TrackerError> {
        self.request(|reply| Command::Reconcile(record, reply)).await
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn state(&self) -> TrackerState {
        self.snapshots.borrow().state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&TrackerSnapshot) -> bool,
    ) -> Result<TrackerSnapshot, TrackerError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(predicate).await.map_err(|_| TrackerError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Stop polling and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("tracker task ended abnormally: {e}");
            }
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, TrackerError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| TrackerError::Closed)?;
        rx.await.map_err(|_| TrackerError::Closed)?
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct Driver {
    machine: JobMachine,
    api: Arc<dyn JobApi>,
    handler: Box<dyn JobEventHandler>,
    poll_interval: Duration,
    snapshots: watch::Sender<TrackerSnapshot>,
    next_poll: Option<Instant>,
    pending: Option<PendingRequest>,
    start_reply: Option<Reply<JobRecord>>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        loop {
            let deadline = self.next_poll;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = next_response(&mut self.pending) => {
                    self.pending = None;
                    self.apply(event);
                }
                _ = wait_until(deadline) => {
                    self.next_poll = None;
                    self.issue_poll();
                }
            }
        }
        tracing::debug!(
            list_id = %self.machine.list_id(),
            kind = %self.machine.kind(),
            state = %self.machine.state(),
            "tracker stopped"
        );
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => match self.machine.handle(MachineEvent::Start) {
                Ok(effects) => {
                    self.start_reply = Some(reply);
                    self.run_effects(effects);
                }
                Err(err) => {
                    tracing::warn!(list_id = %self.machine.list_id(), %err, "start rejected");
                    let _ = reply.send(Err(err));
                }
            },
            Command::Cancel(reply) => {
                let result = self.dispatch_command(MachineEvent::Cancel);
                let _ = reply.send(result);
            }
            Command::Reconcile(record, reply) => {
                let result = self.dispatch_command(MachineEvent::Reconcile(record));
                let _ = reply.send(result);
            }
        }
    }

    fn dispatch_command(&mut self, event: MachineEvent) -> Result<(), TrackerError> {
        match self.machine.handle(event) {
            Ok(effects) => {
                self.run_effects(effects);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(list_id = %self.machine.list_id(), %err, "command rejected");
                Err(err)
            }
        }
    }

    /// Feed a service response into the machine.
    fn apply(&mut self, event: MachineEvent) {
        let start_result = match &event {
            MachineEvent::StartSucceeded(record) => Some(Ok(record.clone())),
            MachineEvent::StartFailed(err) => Some(Err(TrackerError::Lifecycle(
                LifecycleError::JobCreation {
                    list_id: self.machine.list_id().to_string(),
                    kind: self.machine.kind(),
                    source: err.clone(),
                },
            ))),
            _ => None,
        };
        match self.machine.handle(event) {
            Ok(effects) => self.run_effects(effects),
            Err(err) => tracing::warn!(%err, "response rejected by tracker"),
        }
        if let (Some(result), Some(reply)) = (start_result, self.start_reply.take()) {
            let _ = reply.send(result);
        }
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        let mut events = Vec::new();
        for effect in effects {
            match effect {
                Effect::RequestStart => self.issue_start(),
                Effect::SchedulePoll(delay) => {
                    let at = match delay {
                        PollDelay::Immediate => Instant::now(),
                        PollDelay::Interval => Instant::now() + self.poll_interval,
                    };
                    self.next_poll = Some(at);
                }
                Effect::RequestCancel { job_id } => self.issue_cancel(job_id),
                Effect::RequestRefetch { job_id } => self.issue_refetch(job_id),
                Effect::AbortPending => {
                    self.pending = None;
                    self.next_poll = None;
                    if let Some(reply) = self.start_reply.take() {
                        let _ = reply.send(Err(TrackerError::Superseded));
                    }
                }
                Effect::Emit(event) => events.push(event),
            }
        }
        if self.machine.state() != TrackerState::Polling {
            self.next_poll = None;
        }
        self.snapshots.send_replace(self.machine.snapshot());
        for event in &events {
            self.emit(event);
        }
    }

    fn emit(&mut self, event: &TrackerEvent) {
        tracing::debug!(
            list_id = %self.machine.list_id(),
            kind = %self.machine.kind(),
            event = event.name(),
            "emitting tracker event"
        );
        dispatch(self.handler.as_mut(), event);
    }

    fn issue_start(&mut self) {
        let api = Arc::clone(&self.api);
        let list_id = self.machine.list_id().to_string();
        let kind = self.machine.kind();
        tracing::info!(%list_id, %kind, "starting job");
        self.pending = Some(Box::pin(async move {
            match api.start_job(&list_id, kind).await {
                Ok(record) => MachineEvent::StartSucceeded(record),
                Err(err) => MachineEvent::StartFailed(err),
            }
        }));
    }

    fn issue_poll(&mut self) {
        if self.machine.state() != TrackerState::Polling || self.pending.is_some() {
            return;
        }
        let Some(job_id) = self.machine.current_job_id().map(str::to_string) else {
            return;
        };
        let api = Arc::clone(&self.api);
        let list_id = self.machine.list_id().to_string();
        let kind = self.machine.kind();
        tracing::debug!(%list_id, %kind, %job_id, "poll tick");
        self.pending = Some(Box::pin(async move {
            match api.job_status(&list_id, kind, &job_id).await {
                Ok(record) => MachineEvent::PollSucceeded(record),
                Err(err) => MachineEvent::PollFailed(err),
            }
        }));
    }

    fn issue_cancel(&mut self, job_id: String) {
        let api = Arc::clone(&self.api);
        let list_id = self.machine.list_id().to_string();
        let kind = self.machine.kind();
        self.pending = Some(Box::pin(async move {
            match api.cancel_job(&list_id, kind, &job_id).await {
                Ok(record) => MachineEvent::CancelSucceeded(record),
                Err(err) => MachineEvent::CancelFailed(err),
            }
        }));
    }

    fn issue_refetch(&mut self, job_id: String) {
        let api = Arc::clone(&self.api);
        let list_id = self.machine.list_id().to_string();
        let kind = self.machine.kind();
        self.pending = Some(Box::pin(async move {
            match api.job_status(&list_id, kind, &job_id).await {
                Ok(record) => MachineEvent::RefetchSucceeded(record),
                Err(err) => MachineEvent::RefetchFailed(err),
            }
        }));
    }
}

async fn next_response(pending: &mut Option<PendingRequest>) -> MachineEvent {
    match pending.as_mut() {
        Some(request) => request.await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
