//! Cooperative cancellation and progress reporting.
//!
//! Engines call [`ExecutionMonitor::check_cancelled`] and
//! [`ExecutionMonitor::set_progress`] at coarse checkpoints (once per epoch,
//! once per power-iteration sweep). Nothing is interrupted forcibly: a run
//! stops at the next checkpoint after its token is cancelled.

use crate::error::{MdsError, MdsResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub trait ExecutionMonitor: Send + Sync {
    /// Returns [`MdsError::Cancelled`] once cancellation has been requested.
    fn check_cancelled(&self) -> MdsResult<()>;

    /// Reports a fraction of completed work in `[0, 1]`.
    fn set_progress(&self, fraction: f64);
}

/// Never cancels, discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl ExecutionMonitor for NoopMonitor {
    fn check_cancelled(&self) -> MdsResult<()> {
        Ok(())
    }

    fn set_progress(&self, _fraction: f64) {}
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ExecutionMonitor for CancellationToken {
    fn check_cancelled(&self) -> MdsResult<()> {
        if self.is_cancelled() {
            Err(MdsError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_progress(&self, _fraction: f64) {}
}

/// Couples a [`CancellationToken`] with a progress callback.
///
/// Reported fractions are clamped to `[0, 1]` and never decrease.
pub struct ProgressMonitor<F>
where
    F: Fn(f64) + Send + Sync,
{
    token: CancellationToken,
    callback: F,
    // f64 bits of the last fraction handed to the callback
    last: AtomicU64,
}

impl<F> ProgressMonitor<F>
where
    F: Fn(f64) + Send + Sync,
{
    pub fn new(token: CancellationToken, callback: F) -> Self {
        Self {
            token,
            callback,
            last: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl<F> ExecutionMonitor for ProgressMonitor<F>
where
    F: Fn(f64) + Send + Sync,
{
    fn check_cancelled(&self) -> MdsResult<()> {
        self.token.check_cancelled()
    }

    fn set_progress(&self, fraction: f64) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let previous = f64::from_bits(self.last.load(Ordering::SeqCst));
        let fraction = fraction.max(previous);
        self.last.store(fraction.to_bits(), Ordering::SeqCst);
        (self.callback)(fraction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_token_shared_between_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(token.check_cancelled().is_ok());
        other.cancel();
        assert_eq!(token.check_cancelled(), Err(MdsError::Cancelled));
    }

    #[test]
    fn test_progress_is_clamped_and_monotone() {
        let seen = Mutex::new(Vec::new());
        let monitor = ProgressMonitor::new(CancellationToken::new(), |f| {
            seen.lock().unwrap().push(f);
        });
        monitor.set_progress(0.5);
        monitor.set_progress(0.25);
        monitor.set_progress(3.0);
        monitor.set_progress(f64::NAN);
        assert_eq!(*seen.lock().unwrap(), vec![0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_progress_monitor_cancellation() {
        let monitor = ProgressMonitor::new(CancellationToken::new(), |_| {});
        assert!(monitor.check_cancelled().is_ok());
        monitor.token().cancel();
        assert!(monitor.check_cancelled().is_err());
    }
}
