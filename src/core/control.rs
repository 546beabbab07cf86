use std::{sync::Arc, time::Duration, time::Instant};

use log::trace;

use super::{
    aggregate::MetricAggregator,
    config::Config,
    ext_reveal::{overlay_filled, RevealSequencer},
    latch::{Latch, LatchState},
    metrics::{BlendShape, TrackerResult},
    smoother::{to_wire, Smoother},
    watchdog::{NavigationGuard, PresenceWatchdog},
};

#[derive(Debug, Default, PartialEq)]
pub struct FrameOutput {
    pub value: u8,
    pub latched_now: bool,
    pub navigate: Option<Arc<str>>,
    /// `None` on frames without a face.
    pub overlay: Option<bool>,
    pub revealed: Vec<usize>,
}

/// Components run in a fixed order: aggregate, smooth, latch, watchdog, reveal.
pub struct ControlState {
    aggregator: MetricAggregator,
    smoother: Smoother,
    latch: Latch,
    watchdog: PresenceWatchdog,
    guard: NavigationGuard,
    pub sequencer: RevealSequencer,
    speaking_metrics: [BlendShape; 2],
    speaking_threshold: f32,
    overlay: bool,
    idle_view: Arc<str>,
    completion_view: Option<Arc<str>>,
}

impl ControlState {
    pub fn new(config: &Config) -> Self {
        Self {
            aggregator: MetricAggregator::new(
                config.trigger_metrics.clone(),
                config.threshold_lo,
                config.threshold_hi,
            ),
            smoother: Smoother::new(config.smoothing),
            latch: Latch::new(config.commit_metric, config.commit_threshold),
            watchdog: PresenceWatchdog::new(Duration::from_millis(config.absence_timeout_ms)),
            guard: NavigationGuard::default(),
            sequencer: RevealSequencer::new(&config.reveal),
            speaking_metrics: config.speaking_metrics,
            speaking_threshold: config.speaking_threshold,
            overlay: false,
            idle_view: config.idle_view.clone(),
            completion_view: config.completion_view.clone(),
        }
    }

    pub fn frame(
        &mut self,
        result: Option<&TrackerResult>,
        now: Instant,
        frame: u64,
    ) -> FrameOutput {
        let metrics = result.and_then(TrackerResult::face_metrics);

        let target = match metrics {
            Some(metrics) => self.aggregator.update(metrics),
            None => self.aggregator.target(),
        };

        if !self.latch.is_latched() {
            self.smoother.advance(target);
        }

        let mut navigate = None;
        let latched_now = self.latch.evaluate(metrics, self.smoother.value());
        if latched_now {
            if let Some(view) = self.completion_view.as_ref() {
                if self.guard.claim() {
                    navigate = Some(view.clone());
                }
            }
        }

        let face_detected = result.is_some_and(TrackerResult::face_detected);
        if self.watchdog.update(face_detected, now, &mut self.guard) {
            navigate = Some(self.idle_view.clone());
        }

        let revealed = self.sequencer.step(frame);

        let overlay =
            metrics.map(|m| overlay_filled(m, self.speaking_metrics, self.speaking_threshold));
        if let Some(filled) = overlay {
            self.overlay = filled;
        }

        let value = self.value();
        trace!("frame {}: target {:.2} value {}", frame, target, value);

        FrameOutput {
            value,
            latched_now,
            navigate,
            overlay,
            revealed,
        }
    }

    pub fn signal(&self) -> f32 {
        self.latch.frozen().unwrap_or(self.smoother.value())
    }

    pub fn value(&self) -> u8 {
        to_wire(self.signal())
    }

    pub fn latch_state(&self) -> LatchState {
        self.latch.state()
    }

    pub fn overlay_filled(&self) -> bool {
        self.overlay
    }

    pub fn absent_for(&self, now: Instant) -> Option<Duration> {
        self.watchdog.absent_for(now)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::core::metrics::FrameMetrics;

    fn face(pairs: &[(BlendShape, f32)]) -> TrackerResult {
        let mut metrics = FrameMetrics::default();
        for (shape, score) in pairs {
            metrics.set(*shape, *score);
        }
        TrackerResult { faces: 1, metrics }
    }

    fn no_face() -> TrackerResult {
        TrackerResult::default()
    }

    #[test]
    fn smooths_toward_brow_raise() {
        let mut state = ControlState::new(&Config::default());
        let t0 = Instant::now();
        let raised = face(&[(BlendShape::BrowOuterUpLeft, 0.5), (BlendShape::JawOpen, 0.1)]);

        for frame in 1..=10 {
            state.frame(Some(&raised), t0, frame);
        }
        let expected = 127.5 * (1. - 0.9f32.powi(10));
        assert!((state.signal() - expected).abs() < 0.05);
        assert_eq!(state.value(), 83);
        assert_eq!(state.latch_state(), LatchState::Unlatched);
    }

    #[test]
    fn latch_freezes_pushed_value() {
        let mut state = ControlState::new(&Config::default());
        let t0 = Instant::now();
        let raised = face(&[(BlendShape::BrowOuterUpLeft, 0.9)]);

        for frame in 1..50 {
            state.frame(Some(&raised), t0, frame);
        }

        let commit = face(&[(BlendShape::BrowOuterUpLeft, 0.9), (BlendShape::JawOpen, 0.45)]);
        let out = state.frame(Some(&commit), t0, 50);
        assert!(out.latched_now);
        let frozen = out.value;

        for (frame, brow) in (51..200).zip([0.1f32, 0.5, 0.9].into_iter().cycle()) {
            let out = state.frame(
                Some(&face(&[(BlendShape::BrowOuterUpLeft, brow), (BlendShape::JawOpen, 0.)])),
                t0,
                frame,
            );
            assert_eq!(out.value, frozen);
            assert!(!out.latched_now);
        }
        assert_eq!(state.latch_state(), LatchState::Latched);
    }

    #[test]
    fn missing_tracker_holds_target() {
        let mut state = ControlState::new(&Config::default());
        let t0 = Instant::now();
        state.frame(Some(&face(&[(BlendShape::BrowOuterUpRight, 0.9)])), t0, 1);
        let after_one = state.signal();

        // no result at all: the held target keeps pulling the value up
        state.frame(None, t0, 2);
        assert!(state.signal() > after_one);
    }

    #[test]
    fn idle_navigation_fires_once() {
        let mut state = ControlState::new(&Config::default());
        let t0 = Instant::now();
        let absent = no_face();

        assert_eq!(state.frame(Some(&absent), t0, 1).navigate, None);
        let at = |ms| t0 + Duration::from_millis(ms);
        assert_eq!(state.frame(None, at(29_999), 2).navigate, None);
        assert_eq!(
            state.frame(Some(&absent), at(30_001), 3).navigate.as_deref(),
            Some("index.html")
        );
        for frame in 4..100 {
            assert_eq!(state.frame(None, at(30_001 + frame * 16), frame).navigate, None);
        }
    }

    #[test]
    fn face_keeps_scene_alive() {
        let mut state = ControlState::new(&Config::default());
        let t0 = Instant::now();
        let present = face(&[(BlendShape::JawOpen, 0.)]);
        for frame in 0..100u64 {
            let now = t0 + Duration::from_secs(frame);
            let result = if frame % 20 == 0 { Some(&present) } else { None };
            assert_eq!(state.frame(result, now, frame).navigate, None);
        }
    }

    #[test]
    fn completion_view_claims_navigation() {
        let config = Config {
            completion_view: Some("Completed.html".into()),
            ..Default::default()
        };
        let mut state = ControlState::new(&config);
        let t0 = Instant::now();

        let out = state.frame(Some(&face(&[(BlendShape::JawOpen, 0.6)])), t0, 1);
        assert!(out.latched_now);
        assert_eq!(out.navigate.as_deref(), Some("Completed.html"));

        // the idle timeout can no longer navigate
        state.frame(None, t0, 2);
        let out = state.frame(None, t0 + Duration::from_secs(60), 3);
        assert_eq!(out.navigate, None);
    }

    #[test]
    fn overlay_follows_speaking_heuristic() {
        let mut state = ControlState::new(&Config::default());
        let t0 = Instant::now();
        let quiet = face(&[
            (BlendShape::MouthUpperUpRight, 0.01),
            (BlendShape::MouthLowerDownLeft, 0.02),
        ]);
        let talking = face(&[
            (BlendShape::MouthUpperUpRight, 0.3),
            (BlendShape::MouthLowerDownLeft, 0.02),
        ]);

        assert_eq!(state.frame(Some(&quiet), t0, 1).overlay, Some(true));
        assert!(state.overlay_filled());
        assert_eq!(state.frame(None, t0, 2).overlay, None);
        assert!(state.overlay_filled());
        assert_eq!(state.frame(Some(&talking), t0, 3).overlay, Some(false));
        assert!(!state.overlay_filled());
    }

    #[test]
    fn overlay_clears_when_a_mouth_metric_is_missing() {
        let mut state = ControlState::new(&Config::default());
        let t0 = Instant::now();
        let quiet = face(&[
            (BlendShape::MouthUpperUpRight, 0.01),
            (BlendShape::MouthLowerDownLeft, 0.02),
        ]);
        let partial = face(&[(BlendShape::MouthUpperUpRight, 0.5)]);

        state.frame(Some(&quiet), t0, 1);
        assert!(state.overlay_filled());
        assert_eq!(state.frame(Some(&partial), t0, 2).overlay, Some(false));
        assert!(!state.overlay_filled());
    }

    #[test]
    fn absence_boundary_is_exclusive() {
        let mut state = ControlState::new(&Config::default());
        let t0 = Instant::now();
        state.frame(None, t0, 1);
        assert_eq!(state.frame(None, t0 + Duration::from_millis(30_000), 2).navigate, None);
        assert_eq!(
            state.frame(None, t0 + Duration::from_millis(30_001), 3).navigate.as_deref(),
            Some("index.html")
        );
    }

    #[test]
    fn reveal_runs_on_frame_counter() {
        let mut state = ControlState::new(&Config::default());
        let t0 = Instant::now();
        assert!(state.frame(None, t0, 239).revealed.is_empty());
        assert_eq!(state.frame(None, t0, 240).revealed, vec![0, 1]);
        assert_eq!(state.sequencer.line(0).unwrap().shown(), "T");
        assert_eq!(state.sequencer.line(1).unwrap().shown(), "R");
    }

    proptest! {
        #[test]
        fn prop_latched_value_is_immutable(
            warmup in proptest::collection::vec(0f32..=1., 1..40),
            later in proptest::collection::vec((0f32..=1., 0f32..=1.), 1..40),
        ) {
            let mut state = ControlState::new(&Config::default());
            let t0 = Instant::now();
            let mut frame = 0;
            for brow in warmup {
                frame += 1;
                state.frame(Some(&face(&[(BlendShape::BrowOuterUpLeft, brow)])), t0, frame);
            }

            frame += 1;
            let out = state.frame(Some(&face(&[(BlendShape::JawOpen, 0.4)])), t0, frame);
            prop_assert!(out.latched_now);
            let frozen = state.signal();

            for (brow, jaw) in later {
                frame += 1;
                let out = state.frame(
                    Some(&face(&[(BlendShape::BrowOuterUpLeft, brow), (BlendShape::JawOpen, jaw)])),
                    t0,
                    frame,
                );
                prop_assert_eq!(state.signal(), frozen);
                prop_assert_eq!(out.value, to_wire(frozen));
            }
        }
    }
}
