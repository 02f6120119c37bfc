use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const SLICE: Duration = Duration::from_millis(100);

/// Delays used by the scan loop and the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    /// Wait between the end of one cycle and the start of the next
    pub scan_interval: Duration,
    /// Pause after an action so the automated UI can repaint
    pub settle: Duration,
    /// Pause after clicking into a text field
    pub focus_delay: Duration,
    /// Pause between keyboard steps of text entry
    pub key_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(2),
            settle: Duration::from_secs(1),
            focus_delay: Duration::from_millis(500),
            key_delay: Duration::from_millis(200),
        }
    }
}

impl Timings {
    /// All delays zero.
    pub fn instant() -> Self {
        Self {
            scan_interval: Duration::ZERO,
            settle: Duration::ZERO,
            focus_delay: Duration::ZERO,
            key_delay: Duration::ZERO,
        }
    }
}

pub fn sleep(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}

/// Sleep up to `d` in short slices, returning early once `flag` goes false.
pub fn sleep_while(d: Duration, flag: &AtomicBool) {
    let deadline = Instant::now() + d;
    loop {
        if !flag.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_flag_returns_immediately() {
        let flag = AtomicBool::new(false);
        let started = Instant::now();
        sleep_while(Duration::from_secs(5), &flag);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn set_flag_waits_full_duration() {
        let flag = AtomicBool::new(true);
        let started = Instant::now();
        sleep_while(Duration::from_millis(150), &flag);
        assert!(started.elapsed() >= Duration::from_millis(150));
    }
}
