use super::metrics::{BlendShape, FrameMetrics};

pub const OUT_MIN: f32 = 0.;
pub const OUT_MAX: f32 = 255.;

#[inline(always)]
pub fn map_range(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    (value - in_min) / (in_max - in_min) * (out_max - out_min) + out_min
}

/// Picks the strongest of the trigger metrics and maps it onto the control range.
pub struct MetricAggregator {
    triggers: Vec<BlendShape>,
    lo: f32,
    hi: f32,
    target: f32,
}

impl MetricAggregator {
    pub fn new(triggers: Vec<BlendShape>, lo: f32, hi: f32) -> Self {
        Self {
            triggers,
            lo,
            hi,
            target: OUT_MIN,
        }
    }

    /// Maps a raw score to a control value. Scores outside [lo, hi] saturate.
    pub fn score_to_target(&self, score: f32) -> f32 {
        map_range(score.clamp(self.lo, self.hi), self.lo, self.hi, OUT_MIN, OUT_MAX)
    }

    /// Updates the target from this frame's metrics. When none of the trigger
    /// metrics were reported, the previous target is held.
    pub fn update(&mut self, metrics: &FrameMetrics) -> f32 {
        let strongest = self
            .triggers
            .iter()
            .filter_map(|shape| metrics.get(*shape))
            .reduce(f32::max);

        if let Some(score) = strongest {
            self.target = self.score_to_target(score);
        }
        self.target
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn brows() -> MetricAggregator {
        MetricAggregator::new(
            vec![BlendShape::BrowOuterUpLeft, BlendShape::BrowOuterUpRight],
            0.1,
            0.9,
        )
    }

    #[test]
    fn range_endpoints() {
        let agg = brows();
        assert_eq!(agg.score_to_target(0.1), 0.);
        assert_eq!(agg.score_to_target(0.9), 255.);
        assert_eq!(agg.score_to_target(0.0), 0.);
        assert_eq!(agg.score_to_target(1.0), 255.);
        assert!((agg.score_to_target(0.5) - 127.5).abs() < 1e-3);
    }

    #[test]
    fn takes_strongest_trigger() {
        let mut agg = brows();
        let metrics = FrameMetrics::from([
            (BlendShape::BrowOuterUpLeft, 0.3),
            (BlendShape::BrowOuterUpRight, 0.7),
            (BlendShape::JawOpen, 1.0),
        ]);
        let expected = map_range(0.7, 0.1, 0.9, 0., 255.);
        assert!((agg.update(&metrics) - expected).abs() < 1e-3);
    }

    #[test]
    fn absent_trigger_is_excluded_not_zeroed() {
        let mut agg = brows();
        let metrics = FrameMetrics::from([(BlendShape::BrowOuterUpRight, 0.5)]);
        assert!((agg.update(&metrics) - 127.5).abs() < 1e-3);
    }

    #[test]
    fn holds_target_without_triggers() {
        let mut agg = brows();
        agg.update(&FrameMetrics::from([(BlendShape::BrowOuterUpLeft, 0.9)]));
        assert_eq!(agg.target(), 255.);

        let held = agg.update(&FrameMetrics::from([(BlendShape::JawOpen, 0.2)]));
        assert_eq!(held, 255.);
        assert_eq!(agg.update(&FrameMetrics::default()), 255.);
    }

    proptest! {
        #[test]
        fn prop_monotonic_and_bounded(a in 0f32..=1., b in 0f32..=1.) {
            let agg = brows();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let t_lo = agg.score_to_target(lo);
            let t_hi = agg.score_to_target(hi);
            prop_assert!(t_lo <= t_hi);
            prop_assert!((OUT_MIN..=OUT_MAX).contains(&t_lo));
            prop_assert!((OUT_MIN..=OUT_MAX).contains(&t_hi));
        }
    }
}
