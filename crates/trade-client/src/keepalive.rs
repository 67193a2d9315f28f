use crate::session::SessionEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Periodic heartbeat ticks for an authenticated session.
///
/// The timer only produces `SessionEvent::KeepaliveTick`; the session decides
/// whether a ping is actually written.
#[derive(Default)]
pub struct KeepaliveTimer {
    task: Option<AbortHandle>,
}

impl KeepaliveTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts ticking every `period`, first tick one full period from now.
    pub fn start(&mut self, period: Duration, events: &mpsc::UnboundedSender<SessionEvent>) {
        self.stop();
        let events = events.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if events.send(SessionEvent::KeepaliveTick).is_err() {
                    break;
                }
            }
        });
        self.task = Some(task.abort_handle());
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for KeepaliveTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
