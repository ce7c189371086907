// crates/core/src/events.rs
//! Events a tracker emits to its hosting view.

use lists_jobs_types::JobRecord;
use tokio::sync::mpsc;

use crate::error::LifecycleError;

/// Outcome notifications, one per visible lifecycle transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// The job finished successfully.
    Success(JobRecord),
    /// The start request failed, or the server reports the job failed.
    Error(LifecycleError),
    /// A status request failed; polling has stopped.
    PollingError(LifecycleError),
    /// The job was cancelled.
    CancelSuccess(JobRecord),
    /// The cancel request did not take effect; polling resumed.
    CancelError(LifecycleError),
}

impl TrackerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TrackerEvent::Success(_) => "success",
            TrackerEvent::Error(_) => "error",
            TrackerEvent::PollingError(_) => "polling_error",
            TrackerEvent::CancelSuccess(_) => "cancel_success",
            TrackerEvent::CancelError(_) => "cancel_error",
        }
    }
}

/// Callbacks invoked on the tracker's task as events occur.
///
/// Every method defaults to a no-op so hosts implement only what they show.
pub trait JobEventHandler: Send + 'static {
    fn on_success(&mut self, _record: &JobRecord) {}

    fn on_error(&mut self, _error: &LifecycleError) {}

    fn on_polling_error(&mut self, _error: &LifecycleError) {}

    fn on_cancel_success(&mut self, _record: &JobRecord) {}

    fn on_cancel_error(&mut self, _error: &LifecycleError) {}
}

/// Route an event to the matching callback.
pub fn dispatch<H: JobEventHandler + ?Sized>(handler: &mut H, event: &TrackerEvent) {
    match event {
        TrackerEvent::Success(record) => handler.on_success(record),
        TrackerEvent::Error(error) => handler.on_error(error),
        TrackerEvent::PollingError(error) => handler.on_polling_error(error),
        TrackerEvent::CancelSuccess(record) => handler.on_cancel_success(record),
        TrackerEvent::CancelError(error) => handler.on_cancel_error(error),
    }
}

impl JobEventHandler for () {}

/// Forwards every event into a channel. Send errors are ignored: a host that
/// dropped its receiver no longer cares.
impl JobEventHandler for mpsc::UnboundedSender<TrackerEvent> {
    fn on_success(&mut self, record: &JobRecord) {
        let _ = self.send(TrackerEvent::Success(record.clone()));
    }

    fn on_error(&mut self, error: &LifecycleError) {
        let _ = self.send(TrackerEvent::Error(error.clone()));
    }

    fn on_polling_error(&mut self, error: &LifecycleError) {
        let _ = self.send(TrackerEvent::PollingError(error.clone()));
    }

    fn on_cancel_success(&mut self, record: &JobRecord) {
        let _ = self.send(TrackerEvent::CancelSuccess(record.clone()));
    }

    fn on_cancel_error(&mut self, error: &LifecycleError) {
        let _ = self.send(TrackerEvent::CancelError(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use lists_jobs_types::JobKind;

    fn cancelled() -> JobRecord {
        JobRecord::Cancelled {
            id: "J1".into(),
            list_id: "L1".into(),
            started_at: "2024-03-01T10:00:00Z".parse().unwrap(),
            ended_at: None,
            started_by: "u-1".into(),
            started_by_name: None,
        }
    }

    #[derive(Default)]
    struct Counting {
        cancel_successes: usize,
        polling_errors: usize,
    }

    impl JobEventHandler for Counting {
        fn on_cancel_success(&mut self, _record: &JobRecord) {
            self.cancel_successes += 1;
        }

        fn on_polling_error(&mut self, _error: &LifecycleError) {
            self.polling_errors += 1;
        }
    }

    #[test]
    fn test_dispatch_routes_by_variant() {
        let mut handler = Counting::default();
        dispatch(&mut handler, &TrackerEvent::CancelSuccess(cancelled()));
        dispatch(
            &mut handler,
            &TrackerEvent::PollingError(LifecycleError::PollingTransport {
                job_id: "J1".into(),
                kind: JobKind::Refresh,
                source: ClientError::Transport {
                    message: "reset".into(),
                },
            }),
        );
        dispatch(&mut handler, &TrackerEvent::Success(cancelled()));
        assert_eq!(handler.cancel_successes, 1);
        assert_eq!(handler.polling_errors, 1);
    }

    #[test]
    fn test_channel_handler_forwards() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        dispatch(&mut tx, &TrackerEvent::CancelSuccess(cancelled()));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.name(), "cancel_success");
    }

    #[test]
    fn test_channel_handler_ignores_closed_receiver() {
        let (mut tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        dispatch(&mut tx, &TrackerEvent::Success(cancelled()));
    }
}
