use super::aggregate::{OUT_MAX, OUT_MIN};

/// First-order exponential smoothing of the control value.
pub struct Smoother {
    alpha: f32,
    value: f32,
}

impl Smoother {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, value: 0. }
    }

    pub fn advance(&mut self, target: f32) -> f32 {
        self.value += (target - self.value) * self.alpha;
        self.value = self.value.clamp(OUT_MIN, OUT_MAX);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Control value as transmitted: rounded into 0..=255.
#[inline(always)]
pub fn to_wire(value: f32) -> u8 {
    value.round().clamp(OUT_MIN, OUT_MAX) as u8
}
