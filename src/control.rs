//! Cooperative pause/resume/cancel handle threaded through every hot loop.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::CompressError;

const RUNNING: u8 = 0;
const PAUSED: u8 = 1;
const CANCELLED: u8 = 2;

/// Timed-wait bound while paused, so a cancellation requested during a
/// pause is observed within this interval.
const PAUSE_WAIT: Duration = Duration::from_millis(500);

/// Shared execution control for one operation.
///
/// State machine: Running → Paused → Running; Cancelled is terminal from
/// either state. Workers only ever read it; the controlling caller flips it.
#[derive(Debug, Default)]
pub struct Control {
    state: AtomicU8,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask running workers to block at their next checkpoint.
    pub fn pause(&self) {
        let _ = self
            .state
            .compare_exchange(RUNNING, PAUSED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Release paused workers. No-op once cancelled.
    pub fn resume(&self) {
        if self
            .state
            .compare_exchange(PAUSED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.cond.notify_all();
        }
    }

    /// Request cancellation. Terminal: pause/resume have no further effect.
    pub fn cancel(&self) {
        self.state.store(CANCELLED, Ordering::Release);
        self.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Observe the current state: return immediately while running, block
    /// while paused, and surface `Cancelled` as an error.
    ///
    /// Called at least once per processed byte in the coder loops, and
    /// before starting and after finishing any wait.
    pub fn checkpoint(&self) -> Result<(), CompressError> {
        match self.state.load(Ordering::Acquire) {
            RUNNING => Ok(()),
            CANCELLED => Err(CompressError::Cancelled),
            _ => self.wait_while_paused(),
        }
    }

    fn wait_while_paused(&self) -> Result<(), CompressError> {
        let mut guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            match self.state.load(Ordering::Acquire) {
                CANCELLED => return Err(CompressError::Cancelled),
                PAUSED => {
                    let (g, _) = self
                        .cond
                        .wait_timeout(guard, PAUSE_WAIT)
                        .unwrap_or_else(|e| e.into_inner());
                    guard = g;
                }
                _ => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_running_checkpoint_passes() {
        let control = Control::new();
        assert!(control.checkpoint().is_ok());
    }

    #[test]
    fn test_cancel_is_observed() {
        let control = Control::new();
        control.cancel();
        assert!(matches!(
            control.checkpoint(),
            Err(CompressError::Cancelled)
        ));
        assert!(control.is_cancelled());
    }

    #[test]
    fn test_cancel_is_terminal() {
        let control = Control::new();
        control.cancel();
        control.resume();
        assert!(control.is_cancelled());
        control.pause();
        assert!(control.is_cancelled());
    }

    #[test]
    fn test_cancel_while_paused_unblocks() {
        let control = Arc::new(Control::new());
        control.pause();

        let worker = {
            let control = Arc::clone(&control);
            std::thread::spawn(move || control.checkpoint())
        };

        // Give the worker time to enter the paused wait, then cancel.
        std::thread::sleep(Duration::from_millis(50));
        control.cancel();
        let outcome = worker.join().expect("worker panicked");
        assert!(matches!(outcome, Err(CompressError::Cancelled)));
    }

    #[test]
    fn test_resume_releases_pause() {
        let control = Arc::new(Control::new());
        control.pause();

        let worker = {
            let control = Arc::clone(&control);
            std::thread::spawn(move || control.checkpoint())
        };

        std::thread::sleep(Duration::from_millis(50));
        control.resume();
        assert!(worker.join().expect("worker panicked").is_ok());
    }
}
