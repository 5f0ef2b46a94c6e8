//! Cooperative cancellation for long grid evaluations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::AppError;

/// Shared flag checked by the engine between grid rows.
///
/// Clones observe the same flag, so one handle can be given to a watchdog
/// thread while the other is passed into the evaluation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Cancels a token once `timeout` elapses unless dropped first.
///
/// Dropping the guard stops and joins the watchdog thread.
#[derive(Debug)]
pub struct Deadline {
    stop: Option<Sender<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl Deadline {
    pub fn start(token: CancelToken, timeout: Duration) -> Result<Self, AppError> {
        let (stop, stopped) = mpsc::channel::<()>();
        let watchdog = thread::Builder::new()
            .name("kde-deadline".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(timeout) {
                    token.cancel();
                }
            })
            .map_err(|e| AppError::config(format!("Failed to start deadline thread: {e}")))?;
        Ok(Self {
            stop: Some(stop),
            watchdog: Some(watchdog),
        })
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the watchdog without cancelling.
        drop(self.stop.take());
        if let Some(watchdog) = self.watchdog.take() {
            let _ = watchdog.join();
        }
    }
}
