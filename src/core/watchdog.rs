use std::time::{Duration, Instant};

use log::warn;

/// Guards the terminal navigation so it happens at most once per process.
#[derive(Debug, Default)]
pub struct NavigationGuard {
    fired: bool,
}

impl NavigationGuard {
    /// Returns `true` for the first caller only.
    pub fn claim(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    #[cfg(test)]
    pub fn fired(&self) -> bool {
        self.fired
    }
}

/// Measures how long no face has been seen and trips once the absence
/// exceeds the timeout.
pub struct PresenceWatchdog {
    timeout: Duration,
    absent_since: Option<Instant>,
}

impl PresenceWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            absent_since: None,
        }
    }

    /// Returns `true` on the one evaluation that should navigate away.
    pub fn update(&mut self, face_detected: bool, now: Instant, guard: &mut NavigationGuard) -> bool {
        if face_detected {
            self.absent_since = None;
            return false;
        }

        let Some(since) = self.absent_since else {
            self.absent_since = Some(now);
            return false;
        };

        let absent = now.saturating_duration_since(since);
        if absent > self.timeout && guard.claim() {
            warn!(
                "No face detected for {:.1}s, leaving the scene",
                absent.as_secs_f32()
            );
            return true;
        }
        false
    }

    pub fn absent_for(&self, now: Instant) -> Option<Duration> {
        self.absent_since
            .map(|since| now.saturating_duration_since(since))
    }
}
