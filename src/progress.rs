//! Thread-safe, monotonic progress reporting.

use std::sync::Mutex;

/// Callback signature for percentage updates (0–100).
pub type ProgressFn<'a> = dyn Fn(u8) + Sync + 'a;

/// Serializes progress updates and drops any value that does not exceed
/// the last reported one, so out-of-order worker completions can never
/// move the percentage backwards.
pub struct ProgressSink<'a> {
    callback: Option<&'a (dyn Fn(u8) + Sync + 'a)>,
    last: Mutex<i16>,
}

impl<'a> ProgressSink<'a> {
    pub fn new(callback: Option<&'a (dyn Fn(u8) + Sync + 'a)>) -> Self {
        Self {
            callback,
            last: Mutex::new(-1),
        }
    }

    /// Deliver `pct` if it advances past every previously reported value.
    pub fn report(&self, pct: u8) {
        let pct = pct.min(100);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if i16::from(pct) > *last {
            *last = i16::from(pct);
            if let Some(callback) = self.callback {
                callback(pct);
            }
        }
    }
}
