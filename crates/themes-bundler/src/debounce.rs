//! Per-theme rebuild debouncing.
//!
//! A theme is either `Idle` or `BuildPending`. Starting a build opens a
//! window of fixed length; while it is open, further build requests are
//! rejected (coalesced into nothing), not queued. The only transition back
//! to `Idle` is the window's deadline passing.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    BuildPending,
}

#[derive(Debug)]
pub struct DebounceWindow {
    duration: Duration,
    pending_until: Option<Instant>,
}

impl DebounceWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            pending_until: None,
        }
    }

    /// Current state as of `now`, applying the timer transition if the
    /// window has expired.
    pub fn state(&mut self, now: Instant) -> DebounceState {
        match self.pending_until {
            Some(deadline) if now < deadline => DebounceState::BuildPending,
            Some(_) => {
                self.pending_until = None;
                DebounceState::Idle
            }
            None => DebounceState::Idle,
        }
    }

    /// Transition guard for a build request.
    ///
    /// Returns `true` and opens a new window when idle; returns `false` and
    /// leaves the current window untouched when a build is already pending.
    pub fn try_open(&mut self, now: Instant) -> bool {
        if self.state(now) == DebounceState::BuildPending {
            return false;
        }
        self.pending_until = Some(now + self.duration);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let mut window = DebounceWindow::new(Duration::from_millis(100));
        assert_eq!(window.state(Instant::now()), DebounceState::Idle);
    }

    #[test]
    fn test_rejects_within_window() {
        let mut window = DebounceWindow::new(Duration::from_millis(100));
        let start = Instant::now();

        assert!(window.try_open(start));
        assert_eq!(window.state(start), DebounceState::BuildPending);
        assert!(!window.try_open(start + Duration::from_millis(50)));
        assert!(!window.try_open(start + Duration::from_millis(99)));
    }

    #[test]
    fn test_rejected_request_does_not_extend_window() {
        let mut window = DebounceWindow::new(Duration::from_millis(100));
        let start = Instant::now();

        assert!(window.try_open(start));
        assert!(!window.try_open(start + Duration::from_millis(90)));
        assert!(window.try_open(start + Duration::from_millis(100)));
    }

    #[test]
    fn test_returns_to_idle_after_deadline() {
        let mut window = DebounceWindow::new(Duration::from_millis(100));
        let start = Instant::now();

        window.try_open(start);
        assert_eq!(
            window.state(start + Duration::from_millis(150)),
            DebounceState::Idle
        );
        assert!(window.try_open(start + Duration::from_millis(150)));
    }
}
