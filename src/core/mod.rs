use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use colored::{Color, Colorize};
use indicatif::MultiProgress;
use log::{debug, info, trace, warn};
use once_cell::sync::Lazy;
use rosc::OscBundle;
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
    time::{interval, MissedTickBehavior},
};

use self::{
    bundle::UiBundle,
    config::Config,
    control::{ControlState, FrameOutput},
    ext_actuator::{ActuatorClient, RgbPreview, SyncEvent},
    ext_tracker::TrackerReceiver,
    latch::LatchState,
    metrics::{FrameMetrics, NUM_SHAPES},
    status::StatusBar,
};

mod aggregate;
mod bundle;
pub mod config;
mod control;
mod ext_actuator;
mod ext_reveal;
mod ext_tracker;
mod folders;
mod latch;
mod metrics;
mod smoother;
mod status;
mod watchdog;

const PREVIEW_PREFIX: &str = "/preview/";
const METRICS_PREFIX: &str = "/metrics/";
const REVEAL_PREFIX: &str = "/reveal/";
const OVERLAY_ADDR: &str = "/overlay/filled";
const SCENE_ADDR: &str = "/scene/navigate";

static ACT_ON: Lazy<Arc<str>> = Lazy::new(|| format!("{}", "ACTUATOR".color(Color::Green)).into());
static ACT_OFF: Lazy<Arc<str>> = Lazy::new(|| format!("{}", "ACTUATOR".color(Color::Red)).into());
static LATCHED: Lazy<Arc<str>> = Lazy::new(|| format!("{}", "LATCHED".color(Color::Yellow)).into());
static TALKING: Lazy<Arc<str>> = Lazy::new(|| format!("{}", "TALKING".color(Color::Magenta)).into());
static LIVE: Lazy<Arc<str>> = Lazy::new(|| format!("{}", "LIVE".color(Color::Cyan)).into());

/// Metric bars are resent only when they move more than this.
const METRIC_EPSILON: f32 = 0.01;

/// Owns the sockets, the actuator client and the control state, and runs
/// everything on one task: frames, pulls and request completions never overlap.
pub struct ControlLoop {
    config: Config,
    upstream: UdpSocket,
    tracker: TrackerReceiver,
    actuator: ActuatorClient,
    events: UnboundedReceiver<SyncEvent>,
    state: ControlState,
    preview: RgbPreview,
    preview_dirty: bool,
    last_metrics: [f32; NUM_SHAPES],
    last_pull_ok: Option<Instant>,
    push_failing: bool,
    frame: u64,
    status: StatusBar,
}

impl ControlLoop {
    pub fn new(config: Config, multi: &MultiProgress) -> anyhow::Result<ControlLoop> {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);

        let upstream = UdpSocket::bind("0.0.0.0:0").context("bind upstream socket")?;
        upstream
            .connect(SocketAddr::new(ip, config.ui_port))
            .context("upstream connect")?;

        let tracker = TrackerReceiver::start(
            config.tracker_port,
            Duration::from_millis(config.tracker_timeout_ms),
        )?;

        let (sender, events) = unbounded_channel();
        let actuator = ActuatorClient::new(
            &config.colour_url(),
            Duration::from_millis(config.request_timeout_ms),
            sender,
        )?;

        info!("Actuator endpoint: {}", config.colour_url());
        info!("Sending scene updates to port {}", config.ui_port);

        Ok(ControlLoop {
            state: ControlState::new(&config),
            config,
            upstream,
            tracker,
            actuator,
            events,
            preview: RgbPreview::default(),
            preview_dirty: true,
            last_metrics: [f32::NAN; NUM_SHAPES],
            last_pull_ok: None,
            push_failing: false,
            frame: 0,
            status: StatusBar::new(multi),
        })
    }

    fn send_upstream(&self, bundle: OscBundle) {
        if let Some(buf) = bundle.serialize() {
            if let Err(e) = self.upstream.send(&buf) {
                debug!("Could not send scene update: {}", e);
            }
        }
    }

    /// Runs until Ctrl-C.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut frame_timer = interval(self.config.frame_period());
        frame_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut pull_timer = interval(Duration::from_millis(self.config.pull_interval_ms));
        pull_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = frame_timer.tick() => self.process(),
                _ = pull_timer.tick() => {
                    self.actuator.pull();
                }
                Some(event) = self.events.recv() => self.handle_event(event),
                result = &mut shutdown => {
                    result.context("Could not listen for Ctrl-C")?;
                    info!("Shutting down");
                    break;
                }
            }
        }

        self.status.finish();
        Ok(())
    }

    fn process(&mut self) {
        let now = Instant::now();
        self.frame += 1;
        self.status.trip_fps_counter();

        let result = self.tracker.receive(now, &mut self.status).cloned();
        let output = self.state.frame(result.as_ref(), now, self.frame);

        let mut bundle = OscBundle::new_bundle();
        self.apply(&output, &mut bundle);

        if self.config.forward_metrics {
            if let Some(metrics) = result.as_ref().and_then(|r| r.face_metrics()) {
                self.forward_metrics(metrics, &mut bundle);
            }
        }

        if self.actuator.push(output.value) {
            self.status.trip_push_counter();
        }

        self.send_upstream(bundle);
        self.show_status(now);
    }

    fn apply(&mut self, output: &FrameOutput, bundle: &mut OscBundle) {
        if output.latched_now {
            debug!("Holding B at {} from frame {}", output.value, self.frame);
        }

        if let Some(view) = output.navigate.as_ref() {
            info!("Navigating to {}", view);
            bundle.send_navigate(view);
        }

        if let Some(filled) = output.overlay {
            bundle.send_overlay(filled);
        }

        for &idx in output.revealed.iter() {
            if let Some(line) = self.state.sequencer.line(idx) {
                bundle.send_reveal(idx, line.shown(), line.x, line.y, self.state.sequencer.spacing);
            }
        }
        if !output.revealed.is_empty() && self.state.sequencer.is_finished() {
            debug!("Instructions fully revealed at frame {}", self.frame);
        }

        self.preview_dirty |= self.preview.set_local(output.value);
        if self.preview_dirty {
            bundle.send_preview(&self.preview);
            self.preview_dirty = false;
        }
    }

    fn forward_metrics(&mut self, metrics: &FrameMetrics, bundle: &mut OscBundle) {
        for (shape, score) in metrics.iter() {
            let last = &mut self.last_metrics[shape as usize];
            if last.is_nan() || (score - *last).abs() > METRIC_EPSILON {
                bundle.send_metric(shape.into(), score);
                *last = score;
            }
        }
    }

    fn handle_event(&mut self, event: SyncEvent) {
        self.actuator.complete(&event);
        match event {
            SyncEvent::Pushed(Ok(())) => {
                if self.push_failing {
                    info!("Actuator accepting writes again");
                    self.push_failing = false;
                }
            }
            SyncEvent::Pushed(Err(e)) => {
                if self.push_failing {
                    debug!("Actuator write dropped: {:#}", e);
                } else {
                    warn!("Actuator write dropped: {:#}", e);
                    self.push_failing = true;
                }
            }
            SyncEvent::Pulled(Ok(table)) => {
                trace!("Actuator reports {:?}, local B is {}", table, self.preview.b);
                self.last_pull_ok = Some(Instant::now());
                self.preview_dirty |= self.preview.apply_pull(&table);
            }
            SyncEvent::Pulled(Err(e)) => {
                if self.last_pull_ok.is_some() {
                    warn!("Actuator read failed: {:#}", e);
                } else {
                    debug!("Actuator read failed: {:#}", e);
                }
                self.last_pull_ok = None;
            }
        }
    }

    fn show_status(&mut self, now: Instant) {
        self.status.push_summary();

        let reachable = self
            .last_pull_ok
            .is_some_and(|at| now.saturating_duration_since(at) < Duration::from_secs(1));
        self.status
            .add_item(if reachable { ACT_ON.clone() } else { ACT_OFF.clone() });

        self.status.add_item(format!("B:{}", self.preview.b).into());
        self.status.add_item(match self.state.latch_state() {
            LatchState::Latched => LATCHED.clone(),
            LatchState::Unlatched => LIVE.clone(),
        });

        if !self.state.overlay_filled() {
            self.status.add_item(TALKING.clone());
        }

        if let Some(absent) = self.state.absent_for(now) {
            self.status
                .add_item(format!("AWAY:{:.0}s", absent.as_secs_f32()).into());
        }

        self.status.display();
    }
}
