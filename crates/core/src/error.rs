// crates/core/src/error.rs
use std::path::PathBuf;

use lists_jobs_types::{JobErrorDetail, JobKind, JobRecord};
use thiserror::Error;

use crate::machine::TrackerState;

/// Errors returned by the list service client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("Request failed: {message}")]
    Transport { message: String },

    #[error("List service returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// Job record embedded in the error body, e.g. when a cancel races
        /// with the job finishing on the server.
        record: Option<JobRecord>,
    },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Invalid client configuration: {message}")]
    InvalidConfig { message: String },
}

impl ClientError {
    pub fn transport(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }

    /// Build a status error, salvaging a job record from the body if present.
    pub fn status(status: u16, body: String) -> Self {
        let record = serde_json::from_str::<JobRecord>(&body).ok();
        Self::Status {
            status,
            body,
            record,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn embedded_record(&self) -> Option<&JobRecord> {
        match self {
            Self::Status { record, .. } => record.as_ref(),
            _ => None,
        }
    }
}

/// Failures along a job's lifecycle, delivered to event handlers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    /// The start request failed; no job exists.
    #[error("Failed to start {kind} job for list {list_id}: {source}")]
    JobCreation {
        list_id: String,
        kind: JobKind,
        source: ClientError,
    },

    /// The server ran the job and reports that it failed.
    #[error("{kind} job {job_id} failed: {detail}")]
    JobFailed {
        job_id: String,
        kind: JobKind,
        detail: JobErrorDetail,
    },

    /// The status request failed. The job's real outcome is unknown.
    #[error("Status check for {kind} job {job_id} failed: {source}")]
    PollingTransport {
        job_id: String,
        kind: JobKind,
        source: ClientError,
    },

    /// Status checks kept answering with another job or a stale success.
    /// Like a transport failure, the job's real outcome is unknown.
    #[error("Status check for {kind} job {job_id} gave no usable answer after {responses} responses")]
    UnresolvedStatus {
        job_id: String,
        kind: JobKind,
        responses: u32,
    },

    #[error("Cancelling {kind} job {job_id} failed: {source}")]
    Cancellation {
        job_id: String,
        kind: JobKind,
        source: ClientError,
    },
}

/// Errors returned to callers issuing tracker commands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("{command} rejected while tracker is {state}")]
    Rejected {
        command: &'static str,
        state: TrackerState,
    },

    /// The start request failed; the same error was emitted to the handler.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A reconciled job replaced the job this start was waiting for.
    #[error("Start superseded by a reconciled job")]
    Superseded,

    #[error("Tracker has stopped")]
    Closed,
}

/// Errors from the persisted column-visibility store.
#[derive(Debug, Error)]
pub enum ViewStateError {
    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed view state in {path}: {message}")]
    MalformedJson { path: PathBuf, message: String },

    #[error("At least one column must stay visible")]
    EmptySelection,

    #[error("Data directory not found")]
    DataDirNotFound,
}

impl ViewStateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_salvages_record() {
        let body = r#"{"id":"J1","listId":"L1","status":"SUCCESS","startedAt":"2024-03-01T10:00:00Z","contentVersion":7}"#;
        let err = ClientError::status(409, body.to_string());
        assert_eq!(err.status_code(), Some(409));
        let record = err.embedded_record().unwrap();
        assert_eq!(record.id(), "J1");
        assert_eq!(record.content_version(), Some(7));
    }

    #[test]
    fn test_status_error_without_record() {
        let err = ClientError::status(500, "internal error".to_string());
        assert!(err.embedded_record().is_none());
        assert_eq!(err.to_string(), "List service returned 500: internal error");
    }

    #[test]
    fn test_transport_error_has_no_status() {
        let err = ClientError::Transport {
            message: "connection refused".into(),
        };
        assert_eq!(err.status_code(), None);
        assert!(err.embedded_record().is_none());
    }

    #[test]
    fn test_lifecycle_error_display() {
        let err = LifecycleError::JobFailed {
            job_id: "J1".into(),
            kind: JobKind::Refresh,
            detail: JobErrorDetail {
                code: "query.failed".into(),
                message: "bad field".into(),
            },
        };
        assert_eq!(err.to_string(), "refresh job J1 failed: query.failed: bad field");

        let err = LifecycleError::PollingTransport {
            job_id: "J1".into(),
            kind: JobKind::Export,
            source: ClientError::Transport {
                message: "timeout".into(),
            },
        };
        assert!(err.to_string().contains("export job J1"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_tracker_error_display() {
        let err = TrackerError::Rejected {
            command: "cancel",
            state: TrackerState::Idle,
        };
        assert_eq!(err.to_string(), "cancel rejected while tracker is idle");
    }

    #[test]
    fn test_view_state_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ViewStateError::io("/tmp/view-state.json", io_err);
        assert!(err.to_string().contains("/tmp/view-state.json"));
    }
}
