//! Notification fan-out.
//!
//! Emission is fire-and-forget with an explicit bound: each event is handed
//! to the notifier on a background task and awaited for at most the
//! configured timeout. A slow or failing notifier is logged and abandoned;
//! it can never affect the tracking call's outcome. Retries, if any, belong
//! to the notification transport.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::events::GamificationEvent;

/// Notifier delivery failure.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct NotifyError(pub String);

/// External notification collaborator.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, event: &GamificationEvent) -> Result<(), NotifyError>;
}

/// Notifier that drops every event. The default when none is injected.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &GamificationEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Dispatches events to the notifier under a bounded timeout.
pub struct NotificationFanout {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationFanout {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_timeout(notifier, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Emit a batch of events, best-effort.
    ///
    /// Each event runs on its own blocking task; tasks still pending at the
    /// timeout are abandoned, not cancelled, so a stuck notifier cannot
    /// hold up the caller.
    pub async fn emit(&self, events: Vec<GamificationEvent>) {
        let handles: Vec<_> = events
            .into_iter()
            .map(|event| {
                let notifier = Arc::clone(&self.notifier);
                tokio::task::spawn_blocking(move || {
                    if let Err(e) = notifier.notify(&event) {
                        warn!(error = %e, ?event, "notification delivery failed");
                    }
                })
            })
            .collect();

        for handle in handles {
            match tokio::time::timeout(self.timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "notification task panicked"),
                Err(_) => warn!(timeout_ms = self.timeout.as_millis() as u64, "notification emit timed out, abandoned"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SubjectId;
    use chrono::Utc;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<GamificationEvent>>,
    }

    impl Notifier for Recording {
        fn notify(&self, event: &GamificationEvent) -> Result<(), NotifyError> {
            self.seen
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event.clone());
            Ok(())
        }
    }

    struct Failing;

    impl Notifier for Failing {
        fn notify(&self, _event: &GamificationEvent) -> Result<(), NotifyError> {
            Err(NotifyError("transport down".to_string()))
        }
    }

    struct Stuck;

    impl Notifier for Stuck {
        fn notify(&self, _event: &GamificationEvent) -> Result<(), NotifyError> {
            std::thread::sleep(Duration::from_secs(5));
            Ok(())
        }
    }

    fn level_up() -> GamificationEvent {
        GamificationEvent::LevelUp {
            subject: SubjectId::new("u1", "e1"),
            level: 2,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_events_reach_notifier() {
        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let fanout = NotificationFanout::new(recording.clone());
        fanout.emit(vec![level_up(), level_up()]).await;
        assert_eq!(recording.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_error() {
        let fanout = NotificationFanout::new(Arc::new(Failing));
        // Must complete without panicking or surfacing the failure.
        fanout.emit(vec![level_up()]).await;
    }

    #[tokio::test]
    async fn test_stuck_notifier_is_abandoned_within_timeout() {
        let fanout =
            NotificationFanout::with_timeout(Arc::new(Stuck), Duration::from_millis(50));
        let started = std::time::Instant::now();
        fanout.emit(vec![level_up()]).await;
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
