//! Background button polling.

use std::io;
use std::time::Duration;

use tracing::{debug, warn};

use super::{BackgroundWorkers, ButtonEvent, DeviceSession};
use crate::error::DeviceError;

/// Polls a session for button changes on a background worker.
///
/// Each read happens under the session lock, so polling never interleaves
/// with key updates. The callback runs after the lock is released.
#[derive(Debug, Clone, Copy)]
pub struct InputWatcher {
    /// Longest a single read may hold the session.
    pub poll_interval: Duration,
}

impl Default for InputWatcher {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl InputWatcher {
    /// Start polling `session` until the workers are shut down or the
    /// session closes.
    pub fn spawn<F>(
        self,
        session: &DeviceSession,
        workers: &BackgroundWorkers,
        mut on_event: F,
    ) -> io::Result<()>
    where
        F: FnMut(ButtonEvent) + Send + 'static,
    {
        let session = session.clone();
        let poll = self.poll_interval;
        workers.spawn(format!("input-{}", session.id()), move |stop| {
            let mut previous: Vec<bool> = Vec::new();
            while !stop.is_stopped() {
                let states = match session.exclusive().and_then(|mut guard| guard.read_buttons(poll)) {
                    Ok(Some(states)) => states,
                    Ok(None) => continue,
                    Err(DeviceError::Closed { .. }) => break,
                    Err(DeviceError::Busy { .. }) => continue,
                    Err(e) => {
                        warn!(error = %e, "Button polling stopped");
                        break;
                    }
                };

                for event in diff(&previous, &states) {
                    on_event(event);
                }
                previous = states;
            }
            debug!(id = %session.id(), "Input watcher finished");
        })
    }
}

/// Events for every key whose state differs between two snapshots.
fn diff(previous: &[bool], current: &[bool]) -> Vec<ButtonEvent> {
    current
        .iter()
        .enumerate()
        .filter(|(key, pressed)| previous.get(*key).copied().unwrap_or(false) != **pressed)
        .filter_map(|(key, pressed)| {
            u8::try_from(key).ok().map(|key| ButtonEvent {
                key,
                pressed: *pressed,
            })
        })
        .collect()
}
