use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{TerrainError, TerrainResult};

/// Cooperative cancellation signal for long-running operations.
///
/// Every operation that may run long (bulk load, area-wide metrics sweep,
/// filter evaluation over large areas) accepts a `CancellationToken` and
/// checks it at safe points. When the token is cancelled, the operation
/// rolls back any open transaction and returns
/// [`TerrainError::Cancelled`] — no partial batch ever becomes visible.
///
/// Clones share the same underlying flag, so a token handed to a worker can
/// be cancelled from another thread.
///
/// # Examples
///
/// ```rust,ignore
/// use terrapoint::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
/// // ... hand worker_token to a long-running operation ...
/// token.cancel();
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new, non-cancelled token.
    pub fn new() -> Self {
        CancellationToken::default()
    }

    /// Requests cancellation. All clones of this token observe the signal.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(TerrainError::Cancelled)` if cancellation has been
    /// requested, otherwise `Ok(())`. Used at operation checkpoints.
    pub fn checkpoint(&self) -> TerrainResult<()> {
        if self.is_cancelled() {
            Err(TerrainError::Cancelled)
        } else {
            Ok(())
        }
    }
}
