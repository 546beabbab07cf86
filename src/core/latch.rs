use log::info;

use super::metrics::{BlendShape, FrameMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    Unlatched,
    Latched,
}

/// One-way latch: once the commit metric crosses its threshold the control
/// value is frozen for the rest of the process. There is no reset.
pub struct Latch {
    commit: BlendShape,
    threshold: f32,
    state: LatchState,
    frozen: Option<f32>,
}

impl Latch {
    pub fn new(commit: BlendShape, threshold: f32) -> Self {
        Self {
            commit,
            threshold,
            state: LatchState::Unlatched,
            frozen: None,
        }
    }

    /// Returns `true` only on the frame that latches.
    pub fn evaluate(&mut self, metrics: Option<&FrameMetrics>, current: f32) -> bool {
        if self.state == LatchState::Latched {
            return false;
        }

        let Some(score) = metrics.and_then(|m| m.get(self.commit)) else {
            return false;
        };

        if score >= self.threshold {
            let name: &str = self.commit.into();
            info!(
                "{} reached {:.2}, latching control value at {:.1}",
                name, score, current
            );
            self.state = LatchState::Latched;
            self.frozen = Some(current);
            return true;
        }
        false
    }

    pub fn state(&self) -> LatchState {
        self.state
    }

    pub fn is_latched(&self) -> bool {
        self.state == LatchState::Latched
    }

    pub fn frozen(&self) -> Option<f32> {
        self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jaw(score: f32) -> FrameMetrics {
        FrameMetrics::from([(BlendShape::JawOpen, score)])
    }

    #[test]
    fn below_threshold_stays_open() {
        let mut latch = Latch::new(BlendShape::JawOpen, 0.4);
        assert!(!latch.evaluate(Some(&jaw(0.39)), 50.));
        assert!(!latch.evaluate(None, 50.));
        assert!(!latch.evaluate(Some(&FrameMetrics::default()), 50.));
        assert_eq!(latch.state(), LatchState::Unlatched);
        assert_eq!(latch.frozen(), None);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut latch = Latch::new(BlendShape::JawOpen, 0.4);
        assert!(latch.evaluate(Some(&jaw(0.4)), 77.));
        assert_eq!(latch.frozen(), Some(77.));
    }

    #[test]
    fn latches_once_and_never_releases() {
        let mut latch = Latch::new(BlendShape::JawOpen, 0.4);
        assert!(latch.evaluate(Some(&jaw(0.45)), 120.));
        assert!(latch.is_latched());

        assert!(!latch.evaluate(Some(&jaw(0.9)), 200.));
        assert!(!latch.evaluate(Some(&jaw(0.0)), 10.));
        assert!(!latch.evaluate(None, 10.));
        assert!(latch.is_latched());
        assert_eq!(latch.frozen(), Some(120.));
    }
}
