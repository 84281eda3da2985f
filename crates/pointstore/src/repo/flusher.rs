//! Background flush task for a persistent repository.

use crate::error::Result;
use crate::repo::PersistentSeries;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Handle to the periodic flusher thread of one repository.
#[derive(Debug)]
pub(super) struct FlushTask {
    shutdown: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl FlushTask {
    /// Spawns a named thread that flushes the repository every `interval`.
    ///
    /// The thread holds only a weak reference, so dropping the repository
    /// ends it at the next tick.
    pub(super) fn spawn(series: Weak<PersistentSeries>, interval: Duration) -> Result<Self> {
        let (shutdown, ticks) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("pointstore-flush".into())
            .spawn(move || loop {
                match ticks.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(series) = series.upgrade() else { break };
                        if let Err(e) = series.flush() {
                            warn!("periodic flush failed: {e}");
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Signals the thread to exit and waits for it.
    pub(super) fn stop(mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FlushTask {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}
