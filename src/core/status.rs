use std::{collections::VecDeque, sync::Arc, time::Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub struct StatusBar {
    messages: Vec<Arc<str>>,
    spinner: ProgressBar,
    push_counter: VecDeque<Instant>,
    fps_counter: VecDeque<Instant>,
    fps: f32,
    start: Instant,
}

impl StatusBar {
    pub fn new(multi: &MultiProgress) -> Self {
        let spinner = multi.add(ProgressBar::new_spinner());
        spinner.set_style(
            ProgressStyle::default_spinner().tick_chars("⠁⠂⠄⡀⡈⡐⡠⣀⣁⣂⣄⣌⣔⣤⣥⣦⣮⣶⣷⣿⡿⠿⢟⠟⡛⠛⠫⢋⠋⠍⡉⠉⠑⠡⢁"),
        );

        Self {
            messages: Vec::new(),
            spinner,
            push_counter: VecDeque::new(),
            fps_counter: VecDeque::new(),
            start: Instant::now(),
            fps: 1f32,
        }
    }

    pub fn trip_fps_counter(&mut self) {
        self.fps_counter.push_back(Instant::now());
        trim_window(&mut self.fps_counter);

        self.fps = rate(&self.fps_counter);
        self.add_item(format!("TICK:{:.0}/s", self.fps).into());
    }

    pub fn trip_push_counter(&mut self) {
        self.push_counter.push_back(Instant::now());
        trim_window(&mut self.push_counter);
    }

    pub fn push_summary(&mut self) {
        trim_window(&mut self.push_counter);
        self.add_item(format!("PUSH:{:.0}/s", rate(&self.push_counter)).into());
    }

    pub fn add_item(&mut self, str: Arc<str>) {
        self.messages.push(str);
    }

    pub fn display(&mut self) {
        let uptime = self.start.elapsed().as_secs();
        if uptime >= 1 {
            let str = self.messages.join("  ");
            self.spinner.set_message(str);
        } else {
            self.spinner.set_message("Initializing...");
        }
        self.spinner.tick();
        self.messages.clear();
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

/// Drops entries older than one second.
fn trim_window(counter: &mut VecDeque<Instant>) {
    while let Some(time) = counter.front() {
        if time.elapsed().as_secs_f32() > 1. {
            counter.pop_front();
        } else {
            break;
        }
    }
}

fn rate(counter: &VecDeque<Instant>) -> f32 {
    let total_elapsed = counter
        .front()
        .map(|time| time.elapsed().as_secs_f32())
        .unwrap_or(0f32);

    if total_elapsed > 0. {
        counter.len() as f32 / total_elapsed
    } else {
        0.
    }
}
