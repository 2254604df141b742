//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring a pipeline run,
//! [`CancellationToken`] for cooperative cancellation, and [`ProgressInfo`]
//! for progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use reframe::{PipelineConfig, PipelineDriver, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{}] {} frame(s)", info.stage, info.current);
//!     }
//! }
//!
//! let config = PipelineConfig::new("clip.gif").with_progress(Arc::new(PrintProgress));
//! PipelineDriver::new(config).run()?;
//! # Ok::<(), reframe::ReframeError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::error::PipelineStage;

/// A snapshot of pipeline progress.
///
/// Delivered to [`ProgressCallback::on_progress`] every
/// [`batch_size`](crate::PipelineConfig::with_batch_size) frames and once
/// at the end of each stage.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// The stage doing the work.
    pub stage: PipelineStage,
    /// How many frames this stage has handled so far.
    pub current: u64,
    /// Total frames expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the stage started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Source index of the frame just handled.
    pub current_index: Option<u64>,
}

/// Trait for receiving progress updates during a run.
///
/// Implementations must be [`Send`] and [`Sync`] because the parallel
/// transform stage may report from worker threads.
///
/// Progress callbacks observe but cannot halt the run. Use
/// [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals while a stage runs.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone the token and call [`cancel`](CancellationToken::cancel) from any
/// thread. The pipeline checks it before each frame and fails with
/// [`ReframeError::Cancelled`](crate::ReframeError::Cancelled). The
/// temporary frame cache is still removed.
///
/// ```
/// use reframe::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
/// token.clone().cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks timing for one stage and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    stage: PipelineStage,
    total: Option<u64>,
    handled: u64,
    last_reported: u64,
    batch_size: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        stage: PipelineStage,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            stage,
            total,
            handled: 0,
            last_reported: 0,
            batch_size: batch_size.max(1),
            started: Instant::now(),
        }
    }

    /// Count one handled frame; reports once `batch_size` frames have
    /// gone by since the previous report.
    pub(crate) fn advance(&mut self, index: Option<u64>) {
        self.handled += 1;
        if self.handled - self.last_reported >= self.batch_size {
            self.report(index);
        }
    }

    /// Report the stage's final count.
    pub(crate) fn finish(&mut self) {
        self.report(None);
    }

    fn report(&mut self, index: Option<u64>) {
        self.last_reported = self.handled;
        let elapsed = self.started.elapsed();
        let (percentage, estimated_remaining) = match self.total {
            Some(total) if total > 0 && self.handled > 0 => {
                let fraction = self.handled as f64 / total as f64;
                let left = total.saturating_sub(self.handled) as f64 / self.handled as f64;
                (Some((fraction * 100.0) as f32), Some(elapsed.mul_f64(left)))
            }
            _ => (None, None),
        };

        self.callback.on_progress(&ProgressInfo {
            stage: self.stage,
            current: self.handled,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_index: index,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording(Mutex<Vec<ProgressInfo>>);

    impl ProgressCallback for Recording {
        fn on_progress(&self, info: &ProgressInfo) {
            self.0.lock().unwrap().push(info.clone());
        }
    }

    #[test]
    fn tracker_reports_every_batch_and_on_finish() {
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let mut tracker =
            ProgressTracker::new(recording.clone(), PipelineStage::Encoding, Some(5), 2);
        for index in 0..5 {
            tracker.advance(Some(index));
        }
        tracker.finish();

        let infos = recording.0.lock().unwrap();
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[0].current, 2);
        assert_eq!(infos[0].current_index, Some(1));
        assert_eq!(infos[2].current, 5);
        assert_eq!(infos[2].percentage, Some(100.0));
        assert!(infos.iter().all(|info| info.stage == PipelineStage::Encoding));
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let mut tracker = ProgressTracker::new(recording.clone(), PipelineStage::Reading, None, 0);
        tracker.advance(None);
        assert_eq!(recording.0.lock().unwrap().len(), 1);
    }
}
