//! Auth state subscription.
//!
//! Sign-in notifications tend to arrive in bursts. Each event restarts a
//! short timer and only the last event of a burst reaches the profile
//! store, so a burst costs at most one profile reload.

use super::ProfileStore;
use crate::database::AuthEvent;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub const DEFAULT_AUTH_DEBOUNCE: Duration = Duration::from_millis(100);

/// Cancel-and-restart timer. Must be used inside a tokio runtime.
pub struct Debouncer {
    window: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Runs `task` once `window` has passed without another call.
    pub fn schedule<F>(&mut self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let window = self.window;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            task();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Waits for the scheduled task, if any, to run.
    pub async fn flush(&mut self) {
        if let Some(handle) = self.pending.take() {
            // An aborted task is the only error and flush never aborts.
            let _ = handle.await;
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct AuthWatcher;

impl AuthWatcher {
    /// Forwards debounced auth events to `profiles` until the sender side
    /// closes. The last pending event is still delivered on close.
    pub fn spawn(
        profiles: Arc<ProfileStore>,
        mut events: broadcast::Receiver<AuthEvent>,
        window: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut debouncer = Debouncer::new(window);
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!("Auth event received: {event:?}");
                        let profiles = profiles.clone();
                        debouncer.schedule(move || profiles.handle_auth_event(&event));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Auth watcher lagged behind by {skipped} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debouncer.flush().await;
        })
    }
}
