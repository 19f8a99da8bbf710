//! Progress reporting and cancellation for tile computation.
//!
//! A [`ProgressMonitor`] is threaded through every compute call. Operators
//! poll [`ProgressMonitor::check_cancelled`] inside long loops; the engine
//! checks it before and after every tile computation and refuses to cache a
//! tile computed while cancellation was requested.

use crate::core::error::{OperatorError, OperatorResult};
use crate::core::rect::Rectangle;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A progress update event.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// A task has started.
    Started {
        task: String,
        total_work: u64,
    },
    /// Work units were completed.
    Worked {
        done: u64,
        total_work: u64,
    },
    /// An operator finished computing a tile.
    TileComputed {
        operator: String,
        band: String,
        rect: Rectangle,
        duration_ms: u64,
    },
    /// The task has completed.
    Completed {
        task: String,
        duration_ms: u64,
    },
    /// Cancellation was requested.
    Cancelled,
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Tracks progress and carries the cancellation flag.
pub struct ProgressMonitor {
    task: parking_lot::Mutex<String>,
    total_work: AtomicU64,
    done_work: AtomicU64,
    cancelled: AtomicBool,
    start_time: parking_lot::Mutex<Option<Instant>>,
    callback: Option<ProgressCallback>,
}

impl ProgressMonitor {
    /// Create a monitor without callback.
    pub fn new() -> Self {
        Self {
            task: parking_lot::Mutex::new(String::new()),
            total_work: AtomicU64::new(0),
            done_work: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            start_time: parking_lot::Mutex::new(None),
            callback: None,
        }
    }

    /// Create a monitor wrapped in Arc for sharing with another thread.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Begin a task of `total_work` units.
    pub fn begin_task(&self, task: impl Into<String>, total_work: u64) {
        let task = task.into();
        *self.task.lock() = task.clone();
        *self.start_time.lock() = Some(Instant::now());
        self.total_work.store(total_work, Ordering::Relaxed);
        self.done_work.store(0, Ordering::Relaxed);
        self.send_update(ProgressUpdate::Started { task, total_work });
    }

    /// Report `units` of completed work.
    pub fn worked(&self, units: u64) {
        let done = self.done_work.fetch_add(units, Ordering::Relaxed) + units;
        self.send_update(ProgressUpdate::Worked {
            done,
            total_work: self.total_work.load(Ordering::Relaxed),
        });
    }

    /// Finish the current task.
    pub fn done(&self) {
        let duration_ms = self
            .start_time
            .lock()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let task = self.task.lock().clone();
        self.send_update(ProgressUpdate::Completed { task, duration_ms });
    }

    pub(crate) fn tile_computed(&self, operator: &str, band: &str, rect: Rectangle, duration_ms: u64) {
        self.send_update(ProgressUpdate::TileComputed {
            operator: operator.to_string(),
            band: band.to_string(),
            rect,
            duration_ms,
        });
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.send_update(ProgressUpdate::Cancelled);
    }

    /// Return `Err(Cancelled)` if cancellation was requested.
    pub fn check_cancelled(&self) -> OperatorResult<()> {
        if self.is_cancelled() {
            Err(OperatorError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Completed fraction of the current task in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        let total = self.total_work.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let done = self.done_work.load(Ordering::Relaxed);
        (done as f64 / total as f64).clamp(0.0, 1.0)
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fraction() {
        let monitor = ProgressMonitor::new();
        assert_eq!(monitor.fraction(), 0.0);
        monitor.begin_task("tiles", 4);
        monitor.worked(1);
        assert_eq!(monitor.fraction(), 0.25);
        monitor.worked(10);
        assert_eq!(monitor.fraction(), 1.0);
    }

    #[test]
    fn test_cancellation() {
        let monitor = ProgressMonitor::new();
        assert!(monitor.check_cancelled().is_ok());

        monitor.cancel();
        assert!(monitor.is_cancelled());
        assert_eq!(monitor.check_cancelled(), Err(OperatorError::Cancelled));
    }

    #[test]
    fn test_callback_invoked() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let monitor = ProgressMonitor::new().with_callback(Box::new(move |_| {
            call_count_clone.fetch_add(1, Ordering::Relaxed);
        }));

        monitor.begin_task("test", 2);
        monitor.worked(1);
        monitor.tile_computed("Scale", "b1", Rectangle::new(0, 0, 2, 2), 3);
        monitor.done();

        assert_eq!(call_count.load(Ordering::Relaxed), 4);
    }
}
