// crates/types/src/list.rs
//! List details as returned by `GET /lists/{listId}`.

use serde::{Deserialize, Serialize};

use crate::job::JobRecord;

/// A saved entity-query list and the state of its refresh jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDetails {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fql_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_friendly_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_canned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_refresh: Option<JobRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_progress_refresh: Option<JobRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_refresh: Option<JobRecord>,
}

impl ListDetails {
    /// Only an explicit `isActive: false` marks a list inactive.
    pub fn is_inactive(&self) -> bool {
        self.is_active == Some(false)
    }

    /// A list without a query has never been saved past the draft stage.
    pub fn is_in_draft(&self) -> bool {
        self.fql_query.as_deref().map_or(true, |q| q.trim().is_empty())
    }

    pub fn is_canned(&self) -> bool {
        self.is_canned == Some(true)
    }

    /// Content version of the last successful refresh, if any.
    pub fn content_version(&self) -> Option<u64> {
        self.success_refresh.as_ref().and_then(JobRecord::content_version)
    }

    /// Fold a refresh job record into the cached details.
    ///
    /// Returns `false` when the record was ignored: it belongs to another
    /// list, or it is a success whose content version is not newer than the
    /// one already cached.
    pub fn apply_job_record(&mut self, record: &JobRecord) -> bool {
        if record.list_id() != self.id {
            return false;
        }
        match record {
            JobRecord::InProgress { .. } => {
                self.in_progress_refresh = Some(record.clone());
            }
            JobRecord::Success { record_count, content_version, .. } => {
                if let (Some(incoming), Some(cached)) = (content_version, self.content_version()) {
                    if *incoming <= cached {
                        return false;
                    }
                }
                self.success_refresh = Some(record.clone());
                self.in_progress_refresh = None;
                if record_count.is_some() {
                    self.records_count = *record_count;
                }
            }
            JobRecord::Failed { .. } => {
                self.failed_refresh = Some(record.clone());
                self.in_progress_refresh = None;
            }
            JobRecord::Cancelled { .. } => {
                self.in_progress_refresh = None;
            }
        }
        true
    }
}
