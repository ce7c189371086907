// crates/core/src/machine.rs
//! Transition table for a single job tracker.
//!
//! `JobMachine` performs no I/O. It consumes [`MachineEvent`]s (commands
//! from the host and responses from the list service) and returns the
//! [`Effect`]s a driver must carry out: issue a request, arm the poll timer,
//! abort the outstanding request, or emit an event.

use std::fmt;

use lists_jobs_types::{JobKind, JobRecord};

use crate::error::{ClientError, LifecycleError, TrackerError};
use crate::events::TrackerEvent;

/// Consecutive poll answers that name another job or carry a stale success
/// before the tracker gives up on the job.
pub const MAX_IGNORED_POLLS: u32 = 12;

/// Lifecycle state of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Polling,
    Succeeded,
    Failed,
    Cancelling,
    Cancelled,
}

impl TrackerState {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackerState::Idle => "idle",
            TrackerState::Polling => "polling",
            TrackerState::Succeeded => "succeeded",
            TrackerState::Failed => "failed",
            TrackerState::Cancelling => "cancelling",
            TrackerState::Cancelled => "cancelled",
        }
    }

    /// A job is in flight and a new one must not be started.
    pub fn is_active(self) -> bool {
        matches!(self, TrackerState::Polling | TrackerState::Cancelling)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TrackerState::Succeeded | TrackerState::Failed | TrackerState::Cancelled
        )
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineEvent {
    Start,
    StartSucceeded(JobRecord),
    StartFailed(ClientError),
    PollSucceeded(JobRecord),
    PollFailed(ClientError),
    Cancel,
    /// `None` when the service confirmed without a body.
    CancelSucceeded(Option<JobRecord>),
    CancelFailed(ClientError),
    RefetchSucceeded(JobRecord),
    RefetchFailed(ClientError),
    Reconcile(JobRecord),
}

/// When the next status request should go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDelay {
    Immediate,
    Interval,
}

/// Work the driver performs after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RequestStart,
    SchedulePoll(PollDelay),
    RequestCancel { job_id: String },
    /// One status fetch to settle a failed cancel.
    RequestRefetch { job_id: String },
    /// Drop the outstanding request and any armed poll timer.
    AbortPending,
    Emit(TrackerEvent),
}

/// Read-only view of a tracker, published after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    pub list_id: String,
    pub kind: JobKind,
    pub state: TrackerState,
    pub current_job: Option<JobRecord>,
    pub last_error: Option<LifecycleError>,
    pub content_version: Option<u64>,
}

impl TrackerSnapshot {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_cancelling(&self) -> bool {
        self.state == TrackerState::Cancelling
    }
}

pub struct JobMachine {
    list_id: String,
    kind: JobKind,
    state: TrackerState,
    current_job: Option<JobRecord>,
    last_error: Option<LifecycleError>,
    content_version: Option<u64>,
    pending_cancel_error: Option<ClientError>,
    ignored_polls: u32,
}

impl JobMachine {
    pub fn new(list_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            list_id: list_id.into(),
            kind,
            state: TrackerState::Idle,
            current_job: None,
            last_error: None,
            content_version: None,
            pending_cancel_error: None,
            ignored_polls: 0,
        }
    }

    /// Baseline for the staleness rule, usually the list's last known
    /// successful refresh.
    pub fn with_content_version(mut self, version: Option<u64>) -> Self {
        self.content_version = version;
        self
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn current_job(&self) -> Option<&JobRecord> {
        self.current_job.as_ref()
    }

    pub fn current_job_id(&self) -> Option<&str> {
        self.current_job.as_ref().map(JobRecord::id)
    }

    pub fn last_error(&self) -> Option<&LifecycleError> {
        self.last_error.as_ref()
    }

    pub fn content_version(&self) -> Option<u64> {
        self.content_version
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            list_id: self.list_id.clone(),
            kind: self.kind,
            state: self.state,
            current_job: self.current_job.clone(),
            last_error: self.last_error.clone(),
            content_version: self.content_version,
        }
    }

    /// Apply one event. Only host commands (`Start`, `Cancel`) can be
    /// rejected; responses that no longer apply are dropped with no effects.
    pub fn handle(&mut self, event: MachineEvent) -> Result<Vec<Effect>, TrackerError> {
        match event {
            MachineEvent::Start => self.on_start(),
            MachineEvent::Cancel => self.on_cancel(),
            MachineEvent::StartSucceeded(record) => Ok(self.on_start_succeeded(record)),
            MachineEvent::StartFailed(err) => Ok(self.on_start_failed(err)),
            MachineEvent::PollSucceeded(record) => Ok(self.on_poll_succeeded(record)),
            MachineEvent::PollFailed(err) => Ok(self.on_poll_failed(err)),
            MachineEvent::CancelSucceeded(record) => Ok(self.on_cancel_succeeded(record)),
            MachineEvent::CancelFailed(err) => Ok(self.on_cancel_failed(err)),
            MachineEvent::RefetchSucceeded(record) => Ok(self.on_refetch(Ok(record))),
            MachineEvent::RefetchFailed(err) => Ok(self.on_refetch(Err(err))),
            MachineEvent::Reconcile(record) => Ok(self.on_reconcile(record)),
        }
    }

    fn on_start(&mut self) -> Result<Vec<Effect>, TrackerError> {
        if self.state.is_active() {
            return Err(TrackerError::Rejected {
                command: "start",
                state: self.state,
            });
        }
        self.state = TrackerState::Polling;
        self.current_job = None;
        self.last_error = None;
        self.pending_cancel_error = None;
        self.ignored_polls = 0;
        Ok(vec![Effect::RequestStart])
    }

    fn on_start_succeeded(&mut self, record: JobRecord) -> Vec<Effect> {
        if !self.awaiting_start() {
            tracing::warn!(list_id = %self.list_id, job_id = %record.id(), "dropping start response that no longer applies");
            return Vec::new();
        }
        tracing::info!(list_id = %self.list_id, kind = %self.kind, job_id = %record.id(), "job started");
        if record.is_terminal() {
            self.current_job = Some(record.clone());
            return self.adopt_terminal(record, true);
        }
        self.current_job = Some(record);
        vec![Effect::SchedulePoll(PollDelay::Interval)]
    }

    fn on_start_failed(&mut self, err: ClientError) -> Vec<Effect> {
        if !self.awaiting_start() {
            return Vec::new();
        }
        let error = LifecycleError::JobCreation {
            list_id: self.list_id.clone(),
            kind: self.kind,
            source: err,
        };
        tracing::warn!(list_id = %self.list_id, kind = %self.kind, %error, "job start failed");
        self.state = TrackerState::Idle;
        self.last_error = Some(error.clone());
        vec![Effect::Emit(TrackerEvent::Error(error))]
    }

    fn on_poll_succeeded(&mut self, record: JobRecord) -> Vec<Effect> {
        if self.state != TrackerState::Polling || self.current_job.is_none() {
            tracing::debug!(state = %self.state, job_id = %record.id(), "dropping poll response outside polling");
            return Vec::new();
        }
        if self.current_job_id() != Some(record.id()) {
            tracing::warn!(
                expected = ?self.current_job_id(),
                received = %record.id(),
                "poll returned a different job, ignoring"
            );
            return self.ignore_poll();
        }
        if self.is_stale(&record) {
            tracing::warn!(
                job_id = %record.id(),
                incoming = ?record.content_version(),
                known = ?self.content_version,
                "discarding stale success"
            );
            return self.ignore_poll();
        }
        self.ignored_polls = 0;
        if record.is_terminal() {
            return self.adopt_terminal(record, true);
        }
        tracing::debug!(job_id = %record.id(), "job still in progress");
        self.current_job = Some(record);
        vec![Effect::SchedulePoll(PollDelay::Interval)]
    }

    /// Keep polling past an unusable answer, up to [`MAX_IGNORED_POLLS`] in a row.
    fn ignore_poll(&mut self) -> Vec<Effect> {
        self.ignored_polls += 1;
        if self.ignored_polls < MAX_IGNORED_POLLS {
            return vec![Effect::SchedulePoll(PollDelay::Interval)];
        }
        let Some(job_id) = self.polling_job_id() else {
            return Vec::new();
        };
        let error = LifecycleError::UnresolvedStatus {
            job_id,
            kind: self.kind,
            responses: self.ignored_polls,
        };
        tracing::warn!(list_id = %self.list_id, %error, "giving up on job, polling stopped");
        self.state = TrackerState::Failed;
        self.last_error = Some(error.clone());
        self.ignored_polls = 0;
        vec![Effect::Emit(TrackerEvent::PollingError(error))]
    }

    fn on_poll_failed(&mut self, err: ClientError) -> Vec<Effect> {
        let Some(job_id) = self.polling_job_id() else {
            return Vec::new();
        };
        let error = LifecycleError::PollingTransport {
            job_id,
            kind: self.kind,
            source: err,
        };
        tracing::warn!(list_id = %self.list_id, %error, "status check failed, polling stopped");
        self.state = TrackerState::Failed;
        self.last_error = Some(error.clone());
        vec![Effect::Emit(TrackerEvent::PollingError(error))]
    }

    fn on_cancel(&mut self) -> Result<Vec<Effect>, TrackerError> {
        let job_id = match self.polling_job_id() {
            Some(id) => id,
            None => {
                return Err(TrackerError::Rejected {
                    command: "cancel",
                    state: self.state,
                })
            }
        };
        tracing::info!(list_id = %self.list_id, kind = %self.kind, %job_id, "cancelling job");
        self.state = TrackerState::Cancelling;
        self.pending_cancel_error = None;
        Ok(vec![Effect::AbortPending, Effect::RequestCancel { job_id }])
    }

    fn on_cancel_succeeded(&mut self, record: Option<JobRecord>) -> Vec<Effect> {
        if self.state != TrackerState::Cancelling {
            return Vec::new();
        }
        match record {
            Some(record) if record.is_terminal() && self.current_job_id() == Some(record.id()) => {
                self.adopt_terminal(record, true)
            }
            other => {
                if let Some(record) = other {
                    tracing::debug!(job_id = %record.id(), status = ?record.status(), "cancel confirmed with non-terminal body");
                }
                match self.current_job.as_ref().and_then(cancelled_from) {
                    Some(cancelled) => self.adopt_terminal(cancelled, true),
                    None => Vec::new(),
                }
            }
        }
    }

    fn on_cancel_failed(&mut self, err: ClientError) -> Vec<Effect> {
        if self.state != TrackerState::Cancelling {
            return Vec::new();
        }
        let Some(job_id) = self.current_job_id().map(str::to_string) else {
            return Vec::new();
        };
        if let Some(record) = err.embedded_record() {
            if record.is_terminal() && record.id() == job_id && !self.is_stale(record) {
                tracing::info!(%job_id, status = ?record.status(), "cancel lost the race, adopting server outcome");
                return self.adopt_terminal(record.clone(), true);
            }
        }
        tracing::info!(%job_id, error = %err, "cancel failed, re-fetching status once");
        self.pending_cancel_error = Some(err);
        vec![Effect::RequestRefetch { job_id }]
    }

    fn on_refetch(&mut self, result: Result<JobRecord, ClientError>) -> Vec<Effect> {
        if self.state != TrackerState::Cancelling {
            return Vec::new();
        }
        let Some(job_id) = self.current_job_id().map(str::to_string) else {
            return Vec::new();
        };
        match result {
            Ok(record) if record.id() == job_id && record.is_terminal() && !self.is_stale(&record) => {
                tracing::info!(%job_id, status = ?record.status(), "job reached a terminal state during cancel");
                self.adopt_terminal(record, true)
            }
            other => {
                match other {
                    Ok(record) if record.id() == job_id && !record.is_terminal() => {
                        self.current_job = Some(record);
                    }
                    Ok(record) => {
                        tracing::warn!(%job_id, received = %record.id(), "ignoring refetched record");
                    }
                    Err(err) => {
                        tracing::warn!(%job_id, error = %err, "status re-fetch after failed cancel also failed");
                    }
                }
                let source = self
                    .pending_cancel_error
                    .take()
                    .unwrap_or_else(|| ClientError::Decode {
                        message: "cancel failed without an error".into(),
                    });
                let error = LifecycleError::Cancellation {
                    job_id,
                    kind: self.kind,
                    source,
                };
                tracing::warn!(%error, "cancel did not take effect, resuming polling");
                self.state = TrackerState::Polling;
                self.last_error = Some(error.clone());
                self.ignored_polls = 0;
                vec![
                    Effect::Emit(TrackerEvent::CancelError(error)),
                    Effect::SchedulePoll(PollDelay::Interval),
                ]
            }
        }
    }

    fn on_reconcile(&mut self, record: JobRecord) -> Vec<Effect> {
        if record.list_id() != self.list_id {
            tracing::warn!(list_id = %self.list_id, other = %record.list_id(), "ignoring record for another list");
            return Vec::new();
        }
        let same_job = self.current_job_id() == Some(record.id());
        let current_terminal = self.current_job.as_ref().is_some_and(JobRecord::is_terminal);

        if same_job && current_terminal {
            // Terminal records never move again; nothing newer can arrive.
            return Vec::new();
        }
        if record.is_terminal() {
            if self.is_stale(&record) {
                tracing::warn!(job_id = %record.id(), "discarding stale reconciled success");
                return Vec::new();
            }
            let mut effects = vec![Effect::AbortPending];
            effects.extend(self.adopt_terminal(record, false));
            return effects;
        }
        if same_job && self.state.is_active() {
            return Vec::new();
        }
        tracing::info!(list_id = %self.list_id, kind = %self.kind, job_id = %record.id(), "tracking in-progress job");
        self.state = TrackerState::Polling;
        self.current_job = Some(record);
        self.last_error = None;
        self.pending_cancel_error = None;
        self.ignored_polls = 0;
        vec![Effect::AbortPending, Effect::SchedulePoll(PollDelay::Immediate)]
    }

    /// Move to the terminal state matching `record`.
    fn adopt_terminal(&mut self, record: JobRecord, emit: bool) -> Vec<Effect> {
        self.pending_cancel_error = None;
        let event = match &record {
            JobRecord::InProgress { .. } => return Vec::new(),
            JobRecord::Success { content_version, .. } => {
                if content_version.is_some() {
                    self.content_version = *content_version;
                }
                self.state = TrackerState::Succeeded;
                self.last_error = None;
                TrackerEvent::Success(record.clone())
            }
            JobRecord::Failed { id, error, .. } => {
                let error = LifecycleError::JobFailed {
                    job_id: id.clone(),
                    kind: self.kind,
                    detail: error.clone(),
                };
                self.state = TrackerState::Failed;
                self.last_error = Some(error.clone());
                TrackerEvent::Error(error)
            }
            JobRecord::Cancelled { .. } => {
                self.state = TrackerState::Cancelled;
                self.last_error = None;
                TrackerEvent::CancelSuccess(record.clone())
            }
        };
        tracing::info!(
            list_id = %self.list_id,
            kind = %self.kind,
            job_id = %record.id(),
            state = %self.state,
            "job finished"
        );
        self.current_job = Some(record);
        if emit {
            vec![Effect::Emit(event)]
        } else {
            Vec::new()
        }
    }

    /// A success that does not advance the known content version.
    fn is_stale(&self, record: &JobRecord) -> bool {
        match (record.content_version(), self.content_version) {
            (Some(incoming), Some(known)) => incoming <= known,
            _ => false,
        }
    }

    fn awaiting_start(&self) -> bool {
        self.state == TrackerState::Polling && self.current_job.is_none()
    }

    fn polling_job_id(&self) -> Option<String> {
        if self.state != TrackerState::Polling {
            return None;
        }
        self.current_job_id().map(str::to_string)
    }
}

/// The cancelled form of an in-progress record, for confirmations without a body.
fn cancelled_from(record: &JobRecord) -> Option<JobRecord> {
    match record {
        JobRecord::InProgress {
            id,
            list_id,
            started_at,
            started_by,
            started_by_name,
        } => Some(JobRecord::Cancelled {
            id: id.clone(),
            list_id: list_id.clone(),
            started_at: *started_at,
            ended_at: None,
            started_by: started_by.clone(),
            started_by_name: started_by_name.clone(),
        }),
        _ => None,
    }
}
