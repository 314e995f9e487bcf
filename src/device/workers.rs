//! Registry of background threads with a guaranteed drain on shutdown.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

const STOP_POLL: Duration = Duration::from_millis(10);

/// Cooperative stop flag handed to every worker.
#[derive(Debug, Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep up to `duration`, returning early (with `true`) once stopped.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(STOP_POLL.min(deadline - now));
        }
    }
}

/// Owns every background thread started during a run.
#[derive(Debug, Default)]
pub struct BackgroundWorkers {
    stop: Arc<AtomicBool>,
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl BackgroundWorkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a named worker. It should return promptly once its
    /// [`StopSignal`] is raised.
    pub fn spawn<F>(&self, name: impl Into<String>, work: F) -> io::Result<()>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let name = name.into();
        let signal = StopSignal(Arc::clone(&self.stop));
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || work(signal))?;
        debug!(worker = %name, "Spawned background worker");
        self.handles.lock().push((name, handle));
        Ok(())
    }

    /// Number of workers not yet joined.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signal every worker to stop and join them all.
    ///
    /// Workers that already finished, or that panicked, do not fail the
    /// drain. Returns how many workers were joined.
    pub fn shutdown(&self) -> usize {
        self.stop.store(true, Ordering::SeqCst);
        let handles = std::mem::take(&mut *self.handles.lock());
        let joined = handles.len();

        for (name, handle) in handles {
            if handle.is_finished() {
                trace!(worker = %name, "Worker already finished");
            }
            match handle.join() {
                Ok(()) => debug!(worker = %name, "Worker joined"),
                Err(_) => warn!(worker = %name, "Worker panicked before shutdown"),
            }
        }
        joined
    }
}

impl Drop for BackgroundWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}
