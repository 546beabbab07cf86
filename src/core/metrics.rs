use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Face landmarker blend-shape categories, in the order the tracker reports them.
#[allow(unused)]
#[repr(usize)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumCount,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum BlendShape {
    #[strum(serialize = "_neutral")]
    #[serde(rename = "_neutral")]
    Neutral,
    BrowDownLeft,
    BrowDownRight,
    BrowInnerUp,
    BrowOuterUpLeft,
    BrowOuterUpRight,
    CheekPuff,
    CheekSquintLeft,
    CheekSquintRight,
    EyeBlinkLeft,
    EyeBlinkRight,
    EyeLookDownLeft,
    EyeLookDownRight,
    EyeLookInLeft,
    EyeLookInRight,
    EyeLookOutLeft,
    EyeLookOutRight,
    EyeLookUpLeft,
    EyeLookUpRight,
    EyeSquintLeft,
    EyeSquintRight,
    EyeWideLeft,
    EyeWideRight,
    JawForward,
    JawLeft,
    JawOpen,
    JawRight,
    MouthClose,
    MouthDimpleLeft,
    MouthDimpleRight,
    MouthFrownLeft,
    MouthFrownRight,
    MouthFunnel,
    MouthLeft,
    MouthLowerDownLeft,
    MouthLowerDownRight,
    MouthPressLeft,
    MouthPressRight,
    MouthPucker,
    MouthRight,
    MouthRollLower,
    MouthRollUpper,
    MouthShrugLower,
    MouthShrugUpper,
    MouthSmileLeft,
    MouthSmileRight,
    MouthStretchLeft,
    MouthStretchRight,
    MouthUpperUpLeft,
    MouthUpperUpRight,
    NoseSneerLeft,
    NoseSneerRight,
}

pub const NUM_SHAPES: usize = BlendShape::COUNT;

/// Scores of a single face for one processed frame. Categories the tracker
/// did not report stay `None` rather than reading as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetrics {
    scores: [Option<f32>; NUM_SHAPES],
}

impl Default for FrameMetrics {
    fn default() -> Self {
        Self {
            scores: [None; NUM_SHAPES],
        }
    }
}

impl FrameMetrics {
    #[inline(always)]
    pub fn get(&self, shape: BlendShape) -> Option<f32> {
        self.scores[shape as usize]
    }

    #[inline(always)]
    pub fn set(&mut self, shape: BlendShape, score: f32) {
        self.scores[shape as usize] = Some(score);
    }

    pub fn is_empty(&self) -> bool {
        self.scores.iter().all(Option::is_none)
    }

    /// Reported scores, skipping the neutral category.
    pub fn iter(&self) -> impl Iterator<Item = (BlendShape, f32)> + '_ {
        use strum::IntoEnumIterator;
        BlendShape::iter()
            .skip(1)
            .filter_map(|shape| self.get(shape).map(|score| (shape, score)))
    }
}

impl<const N: usize> From<[(BlendShape, f32); N]> for FrameMetrics {
    fn from(pairs: [(BlendShape, f32); N]) -> Self {
        let mut metrics = FrameMetrics::default();
        for (shape, score) in pairs {
            metrics.set(shape, score);
        }
        metrics
    }
}

/// One result from the landmark tracker. Only the first face's scores are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerResult {
    pub faces: usize,
    pub metrics: FrameMetrics,
}

impl TrackerResult {
    pub fn face_detected(&self) -> bool {
        self.faces > 0
    }

    /// Scores of the tracked face, if there is one.
    pub fn face_metrics(&self) -> Option<&FrameMetrics> {
        self.face_detected().then_some(&self.metrics)
    }
}
