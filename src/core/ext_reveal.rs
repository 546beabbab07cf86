use std::collections::VecDeque;

use super::{
    config::RevealConfig,
    metrics::{BlendShape, FrameMetrics},
};

/// One line of instruction text revealed a character at a time.
pub struct RevealQueue {
    pending: VecDeque<char>,
    shown: String,
    next_release: u64,
    pub x: i32,
    pub y: i32,
}

impl RevealQueue {
    pub fn new(text: &str, x: i32, y: i32) -> Self {
        Self {
            pending: text.chars().collect(),
            shown: String::new(),
            next_release: 0,
            x,
            y,
        }
    }

    fn step(&mut self, frame: u64, interval: u64) -> bool {
        if frame < self.next_release {
            return false;
        }
        let Some(c) = self.pending.pop_front() else {
            return false;
        };
        self.shown.push(c);
        self.next_release = frame + interval;
        true
    }

    pub fn shown(&self) -> &str {
        &self.shown
    }

    pub fn is_drained(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Drives every reveal line from the frame counter. Nothing is released
/// before the start delay; all lines open on the same frame.
pub struct RevealSequencer {
    delay: u64,
    interval: u64,
    pub spacing: i32,
    started: bool,
    queues: Vec<RevealQueue>,
}

impl RevealSequencer {
    pub fn new(config: &RevealConfig) -> Self {
        Self {
            delay: config.delay_frames,
            interval: config.interval_frames,
            spacing: config.spacing,
            started: false,
            queues: config
                .lines
                .iter()
                .map(|line| RevealQueue::new(&line.text, line.x, line.y))
                .collect(),
        }
    }

    /// Advances to `frame`. Returns the indices of lines that changed.
    pub fn step(&mut self, frame: u64) -> Vec<usize> {
        if !self.started {
            if frame < self.delay {
                return Vec::new();
            }
            self.started = true;
            self.queues.iter_mut().for_each(|q| q.next_release = frame);
        }

        let interval = self.interval;
        self.queues
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, q)| q.step(frame, interval).then_some(idx))
            .collect()
    }

    pub fn line(&self, idx: usize) -> Option<&RevealQueue> {
        self.queues.get(idx)
    }

    pub fn is_finished(&self) -> bool {
        self.queues.iter().all(RevealQueue::is_drained)
    }
}

/// "Not speaking" heuristic for the overlay: both mouth metrics present and
/// below the threshold fills it, anything else clears it.
pub fn overlay_filled(metrics: &FrameMetrics, pair: [BlendShape; 2], threshold: f32) -> bool {
    pair.iter()
        .all(|&shape| metrics.get(shape).is_some_and(|score| score < threshold))
}
