// crates/types/src/job.rs
//! Job records reported by the list service for refresh and export jobs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which long-running operation a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Refresh,
    Export,
}

impl JobKind {
    /// Path segment used under `/lists/{listId}/`.
    pub fn path_segment(self) -> &'static str {
        match self {
            JobKind::Refresh => "refresh",
            JobKind::Export => "export",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "refresh" => Ok(JobKind::Refresh),
            "export" | "exports" => Ok(JobKind::Export),
            other => Err(format!("unknown job kind: {other}")),
        }
    }
}

/// Discriminant of a [`JobRecord`], as it appears in the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

/// Business-level failure reported by the server for a failed job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for JobErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code.is_empty(), self.message.is_empty()) {
            (false, false) => write!(f, "{}: {}", self.code, self.message),
            (false, true) => f.write_str(&self.code),
            (true, false) => f.write_str(&self.message),
            (true, true) => f.write_str("unknown error"),
        }
    }
}

/// A server-side job, keyed by `status`.
///
/// Field names follow the generic job shape; aliases accept the names the
/// refresh (`refreshStartDate`, `refreshedBy`, ...) and export (`exportId`,
/// `startDate`, `createdBy`, ...) endpoints actually emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobRecord {
    #[serde(rename_all = "camelCase")]
    InProgress {
        #[serde(alias = "exportId")]
        id: String,
        list_id: String,
        #[serde(alias = "refreshStartDate", alias = "startDate")]
        started_at: DateTime<Utc>,
        #[serde(default, alias = "refreshedBy", alias = "createdBy")]
        started_by: String,
        #[serde(default, alias = "refreshedByUsername", skip_serializing_if = "Option::is_none")]
        started_by_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Success {
        #[serde(alias = "exportId")]
        id: String,
        list_id: String,
        #[serde(alias = "refreshStartDate", alias = "startDate")]
        started_at: DateTime<Utc>,
        #[serde(default, alias = "refreshEndDate", alias = "endDate", skip_serializing_if = "Option::is_none")]
        ended_at: Option<DateTime<Utc>>,
        #[serde(default, alias = "refreshedBy", alias = "createdBy")]
        started_by: String,
        #[serde(default, alias = "refreshedByUsername", skip_serializing_if = "Option::is_none")]
        started_by_name: Option<String>,
        #[serde(default, alias = "recordsCount", skip_serializing_if = "Option::is_none")]
        record_count: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_version: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        #[serde(alias = "exportId")]
        id: String,
        list_id: String,
        #[serde(alias = "refreshStartDate", alias = "startDate")]
        started_at: DateTime<Utc>,
        #[serde(default, alias = "refreshEndDate", alias = "endDate", skip_serializing_if = "Option::is_none")]
        ended_at: Option<DateTime<Utc>>,
        #[serde(default, alias = "refreshedBy", alias = "createdBy")]
        started_by: String,
        #[serde(default, alias = "refreshedByUsername", skip_serializing_if = "Option::is_none")]
        started_by_name: Option<String>,
        #[serde(default)]
        error: JobErrorDetail,
    },
    #[serde(rename_all = "camelCase")]
    Cancelled {
        #[serde(alias = "exportId")]
        id: String,
        list_id: String,
        #[serde(alias = "refreshStartDate", alias = "startDate")]
        started_at: DateTime<Utc>,
        #[serde(default, alias = "refreshEndDate", alias = "endDate", skip_serializing_if = "Option::is_none")]
        ended_at: Option<DateTime<Utc>>,
        #[serde(default, alias = "refreshedBy", alias = "createdBy")]
        started_by: String,
        #[serde(default, alias = "refreshedByUsername", skip_serializing_if = "Option::is_none")]
        started_by_name: Option<String>,
    },
}

impl JobRecord {
    pub fn id(&self) -> &str {
        match self {
            JobRecord::InProgress { id, .. }
            | JobRecord::Success { id, .. }
            | JobRecord::Failed { id, .. }
            | JobRecord::Cancelled { id, .. } => id,
        }
    }

    pub fn list_id(&self) -> &str {
        match self {
            JobRecord::InProgress { list_id, .. }
            | JobRecord::Success { list_id, .. }
            | JobRecord::Failed { list_id, .. }
            | JobRecord::Cancelled { list_id, .. } => list_id,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobRecord::InProgress { .. } => JobStatus::InProgress,
            JobRecord::Success { .. } => JobStatus::Success,
            JobRecord::Failed { .. } => JobStatus::Failed,
            JobRecord::Cancelled { .. } => JobStatus::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        match self {
            JobRecord::InProgress { started_at, .. }
            | JobRecord::Success { started_at, .. }
            | JobRecord::Failed { started_at, .. }
            | JobRecord::Cancelled { started_at, .. } => *started_at,
        }
    }

    /// `None` while the job is still running.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        match self {
            JobRecord::InProgress { .. } => None,
            JobRecord::Success { ended_at, .. }
            | JobRecord::Failed { ended_at, .. }
            | JobRecord::Cancelled { ended_at, .. } => *ended_at,
        }
    }

    pub fn started_by_name(&self) -> Option<&str> {
        match self {
            JobRecord::InProgress { started_by_name, .. }
            | JobRecord::Success { started_by_name, .. }
            | JobRecord::Failed { started_by_name, .. }
            | JobRecord::Cancelled { started_by_name, .. } => started_by_name.as_deref(),
        }
    }

    /// Only successful jobs carry a content version.
    pub fn content_version(&self) -> Option<u64> {
        match self {
            JobRecord::Success { content_version, .. } => *content_version,
            _ => None,
        }
    }

    pub fn record_count(&self) -> Option<u64> {
        match self {
            JobRecord::Success { record_count, .. } => *record_count,
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&JobErrorDetail> {
        match self {
            JobRecord::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_in_progress_refresh_from_service_names() {
        let json = r#"{
            "id": "J1",
            "listId": "L1",
            "status": "IN_PROGRESS",
            "refreshStartDate": "2024-03-01T10:00:00Z",
            "refreshedBy": "u-1",
            "refreshedByUsername": "jdoe"
        }"#;
        let record: JobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id(), "J1");
        assert_eq!(record.list_id(), "L1");
        assert_eq!(record.status(), JobStatus::InProgress);
        assert_eq!(record.started_by_name(), Some("jdoe"));
        assert!(!record.is_terminal());
        assert!(record.ended_at().is_none());
    }

    #[test]
    fn test_success_refresh_carries_count_and_version() {
        let json = r#"{
            "id": "J1",
            "listId": "L1",
            "status": "SUCCESS",
            "refreshStartDate": "2024-03-01T10:00:00Z",
            "refreshEndDate": "2024-03-01T10:00:05Z",
            "refreshedBy": "u-1",
            "refreshedByUsername": "jdoe",
            "recordsCount": 42,
            "contentVersion": 7
        }"#;
        let record: JobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.record_count(), Some(42));
        assert_eq!(record.content_version(), Some(7));
        assert!(record.is_terminal());
        assert!(record.ended_at().is_some());
    }

    #[test]
    fn test_failed_refresh_error_detail() {
        let json = r#"{
            "id": "J2",
            "listId": "L1",
            "status": "FAILED",
            "refreshStartDate": "2024-03-01T10:00:00Z",
            "refreshedBy": "u-1",
            "error": {"code": "query.failed", "message": "bad field"}
        }"#;
        let record: JobRecord = serde_json::from_str(json).unwrap();
        let error = record.error().unwrap();
        assert_eq!(error.code, "query.failed");
        assert_eq!(error.to_string(), "query.failed: bad field");
    }

    #[test]
    fn test_export_record_uses_export_names() {
        let json = r#"{
            "exportId": "E1",
            "listId": "L1",
            "status": "SUCCESS",
            "startDate": "2024-03-01T10:00:00Z",
            "endDate": "2024-03-01T10:01:00Z",
            "createdBy": "u-9"
        }"#;
        let record: JobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id(), "E1");
        assert_eq!(record.content_version(), None);
        assert_eq!(record.record_count(), None);
    }

    #[test]
    fn test_serialize_uses_generic_names() {
        let record = JobRecord::Cancelled {
            id: "J3".into(),
            list_id: "L1".into(),
            started_at: "2024-03-01T10:00:00Z".parse().unwrap(),
            ended_at: None,
            started_by: "u-1".into(),
            started_by_name: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"CANCELLED\""));
        assert!(json.contains("\"listId\":\"L1\""));
        assert!(json.contains("\"startedAt\""));
        assert!(!json.contains("endedAt"));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let json = r#"{"id":"J","listId":"L","status":"QUEUED","startedAt":"2024-03-01T10:00:00Z"}"#;
        assert!(serde_json::from_str::<JobRecord>(json).is_err());
    }

    #[test]
    fn test_job_kind_parse_and_display() {
        assert_eq!("refresh".parse::<JobKind>(), Ok(JobKind::Refresh));
        assert_eq!("EXPORTS".parse::<JobKind>(), Ok(JobKind::Export));
        assert!("delete".parse::<JobKind>().is_err());
        assert_eq!(JobKind::Export.to_string(), "export");
    }

    #[test]
    fn test_error_detail_display_fallbacks() {
        assert_eq!(JobErrorDetail::default().to_string(), "unknown error");
        let only_code = JobErrorDetail { code: "x".into(), message: String::new() };
        assert_eq!(only_code.to_string(), "x");
    }
}
