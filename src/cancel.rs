//! Request-scoped cancellation.
//!
//! One [`CancelToken`] accompanies each pipeline execution. The pipeline
//! checks it at stage boundaries and between independent work items (pair
//! queries, per-mention decisions); a triggered token turns into
//! [`PipelineError::Cancelled`] instead of a partial result.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::error::PipelineError;

/// Cloneable cancellation signal with an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never fires on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires once `deadline` passes.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Trigger cancellation. Safe to call from another thread; all clones
    /// observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether the token has fired (explicitly or by deadline).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.deadline_exceeded()
    }

    fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Return an error if the token has fired, for use with `?` at
    /// checkpoints.
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.deadline_exceeded() {
            return Err(PipelineError::Cancelled {
                deadline_exceeded: true,
            });
        }
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(PipelineError::Cancelled {
                deadline_exceeded: false,
            });
        }
        Ok(())
    }
}
