// crates/core/src/affordances.rs
//! Which list actions are offered, and which are disabled, given the
//! current job activity.

use lists_jobs_types::ListDetails;

use crate::machine::{TrackerSnapshot, TrackerState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionConditions {
    pub refresh_in_progress: bool,
    pub cancel_refresh_in_progress: bool,
    pub export_in_progress: bool,
    pub cancel_export_in_progress: bool,
    pub delete_in_progress: bool,
    pub list_inactive: bool,
    pub list_in_draft: bool,
    pub list_canned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Refresh,
    CancelRefresh,
    Edit,
    Delete,
    Export,
    CancelExport,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::CancelRefresh => "cancel-refresh",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Export => "export",
            Self::CancelExport => "cancel-export",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionButton {
    pub action: Action,
    pub disabled: bool,
}

impl ActionConditions {
    /// Build conditions from the refresh and export trackers of one list.
    pub fn from_trackers(
        refresh: &TrackerSnapshot,
        export: &TrackerSnapshot,
        details: &ListDetails,
        delete_in_progress: bool,
    ) -> Self {
        Self {
            refresh_in_progress: refresh.state.is_active(),
            cancel_refresh_in_progress: refresh.state == TrackerState::Cancelling,
            export_in_progress: export.state.is_active(),
            cancel_export_in_progress: export.state == TrackerState::Cancelling,
            delete_in_progress,
            list_inactive: details.is_inactive(),
            list_in_draft: details.is_in_draft(),
            list_canned: details.is_canned(),
        }
    }

    /// The four action slots in menu order: refresh, edit, delete, export.
    /// The first and last slots swap to their cancel form while a job runs.
    pub fn action_buttons(&self) -> [ActionButton; 4] {
        let busy = self.refresh_in_progress || self.export_in_progress || self.delete_in_progress;

        let refresh_slot = if self.refresh_in_progress {
            ActionButton {
                action: Action::CancelRefresh,
                disabled: self.cancel_refresh_in_progress || self.delete_in_progress,
            }
        } else {
            ActionButton {
                action: Action::Refresh,
                disabled: self.list_inactive
                    || self.list_in_draft
                    || self.delete_in_progress
                    || self.export_in_progress,
            }
        };

        let export_slot = if self.export_in_progress {
            ActionButton {
                action: Action::CancelExport,
                disabled: self.cancel_export_in_progress || self.delete_in_progress,
            }
        } else {
            ActionButton {
                action: Action::Export,
                disabled: self.refresh_in_progress
                    || self.list_inactive
                    || self.list_in_draft
                    || self.delete_in_progress,
            }
        };

        [
            refresh_slot,
            ActionButton {
                action: Action::Edit,
                disabled: self.list_canned || busy,
            },
            ActionButton {
                action: Action::Delete,
                disabled: self.list_canned || busy,
            },
            export_slot,
        ]
    }

    pub fn button(&self, action: Action) -> Option<ActionButton> {
        self.action_buttons().into_iter().find(|b| b.action == action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::tests::in_progress;
    use crate::machine::JobMachine;
    use lists_jobs_types::JobKind;
    use pretty_assertions::assert_eq;

    fn labels(conditions: &ActionConditions) -> Vec<(&'static str, bool)> {
        conditions
            .action_buttons()
            .iter()
            .map(|b| (b.action.label(), b.disabled))
            .collect()
    }

    #[test]
    fn test_idle_active_list_enables_everything() {
        let c = ActionConditions::default();
        assert_eq!(
            labels(&c),
            vec![
                ("refresh", false),
                ("edit", false),
                ("delete", false),
                ("export", false)
            ]
        );
    }

    #[test]
    fn test_refresh_in_progress_swaps_to_cancel() {
        let c = ActionConditions {
            refresh_in_progress: true,
            ..Default::default()
        };
        assert_eq!(
            labels(&c),
            vec![
                ("cancel-refresh", false),
                ("edit", true),
                ("delete", true),
                ("export", true)
            ]
        );
    }

    #[test]
    fn test_cancel_pending_disables_cancel_button() {
        let c = ActionConditions {
            export_in_progress: true,
            cancel_export_in_progress: true,
            ..Default::default()
        };
        assert_eq!(
            c.button(Action::CancelExport),
            Some(ActionButton {
                action: Action::CancelExport,
                disabled: true
            })
        );
        assert_eq!(c.button(Action::Refresh).map(|b| b.disabled), Some(true));
        assert_eq!(c.button(Action::Export), None);
    }

    #[test]
    fn test_draft_or_inactive_list_cannot_refresh_or_export() {
        for c in [
            ActionConditions {
                list_in_draft: true,
                ..Default::default()
            },
            ActionConditions {
                list_inactive: true,
                ..Default::default()
            },
        ] {
            assert_eq!(c.button(Action::Refresh).map(|b| b.disabled), Some(true));
            assert_eq!(c.button(Action::Export).map(|b| b.disabled), Some(true));
            assert_eq!(c.button(Action::Edit).map(|b| b.disabled), Some(false));
        }
    }

    #[test]
    fn test_canned_list_cannot_be_edited_or_deleted() {
        let c = ActionConditions {
            list_canned: true,
            ..Default::default()
        };
        assert_eq!(
            labels(&c),
            vec![
                ("refresh", false),
                ("edit", true),
                ("delete", true),
                ("export", false)
            ]
        );
    }

    #[test]
    fn test_delete_in_progress_disables_all() {
        let c = ActionConditions {
            delete_in_progress: true,
            refresh_in_progress: true,
            ..Default::default()
        };
        assert!(c.action_buttons().iter().all(|b| b.disabled));
    }

    #[test]
    fn test_from_trackers() {
        let mut refresh = JobMachine::new("L1", JobKind::Refresh);
        refresh
            .handle(crate::machine::MachineEvent::Reconcile(in_progress("J1")))
            .unwrap();
        let export = JobMachine::new("L1", JobKind::Export);
        let details = ListDetails {
            id: "L1".into(),
            fql_query: Some(r#"{"status": {"$eq": "open"}}"#.into()),
            is_active: Some(true),
            ..Default::default()
        };

        let c = ActionConditions::from_trackers(
            &refresh.snapshot(),
            &export.snapshot(),
            &details,
            false,
        );
        assert_eq!(
            c,
            ActionConditions {
                refresh_in_progress: true,
                ..Default::default()
            }
        );
    }
}
