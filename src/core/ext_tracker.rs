use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket},
    str::FromStr,
    sync::{
        mpsc::{sync_channel, Receiver, SyncSender},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use colored::{Color, Colorize};
use once_cell::sync::Lazy;
use rosc::{OscBundle, OscPacket, OscType};

use super::{
    metrics::{BlendShape, TrackerResult},
    status::StatusBar,
};

static STA_ON: Lazy<Arc<str>> = Lazy::new(|| format!("{}", "TRACKER".color(Color::Green)).into());
static STA_OFF: Lazy<Arc<str>> = Lazy::new(|| format!("{}", "TRACKER".color(Color::Red)).into());

const FACES_ADDR: &str = "/faces";

/// Receives tracker results as OSC bundles on a background thread and keeps
/// the most recent one for the frame loop.
pub struct TrackerReceiver {
    receiver: Receiver<Box<TrackerResult>>,
    latest: Option<Box<TrackerResult>>,
    last_received: Option<Instant>,
    timeout: Duration,
}

impl TrackerReceiver {
    pub fn start(port: u16, timeout: Duration) -> anyhow::Result<Self> {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let listener = UdpSocket::bind(SocketAddr::new(ip, port))
            .with_context(|| format!("Could not bind tracker socket on port {}", port))?;
        log::info!("Listening for tracker results on {}", listener.local_addr()?);

        let (sender, receiver) = sync_channel(8);
        thread::spawn(move || tracker_loop(listener, sender));

        Ok(Self::from_channel(receiver, timeout))
    }

    fn from_channel(receiver: Receiver<Box<TrackerResult>>, timeout: Duration) -> Self {
        Self {
            receiver,
            latest: None,
            last_received: None,
            timeout,
        }
    }

    /// Drains pending results and returns the newest one that is still fresh.
    /// `None` means the tracker is not ready.
    pub fn receive(&mut self, now: Instant, status: &mut StatusBar) -> Option<&TrackerResult> {
        for result in self.receiver.try_iter() {
            self.latest = Some(result);
            self.last_received = Some(now);
        }

        let fresh = self
            .last_received
            .is_some_and(|at| now.saturating_duration_since(at) < self.timeout);

        if fresh {
            status.add_item(STA_ON.clone());
            self.latest.as_deref()
        } else {
            status.add_item(STA_OFF.clone());
            None
        }
    }
}

fn tracker_loop(listener: UdpSocket, sender: SyncSender<Box<TrackerResult>>) {
    let mut buf = [0u8; rosc::decoder::MTU];
    loop {
        let Ok((size, _addr)) = listener.recv_from(&mut buf) else {
            thread::sleep(Duration::from_millis(100));
            continue;
        };

        match rosc::decoder::decode_udp(&buf[..size]) {
            Ok((_, OscPacket::Bundle(bundle))) => {
                let result = Box::new(parse_result(&bundle));
                if let Err(e) = sender.try_send(result) {
                    log::debug!("Dropping tracker result: {}", e);
                }
            }
            Ok((_, OscPacket::Message(msg))) => {
                log::debug!("Ignoring unbundled tracker message {}", msg.addr);
            }
            Err(e) => log::warn!("Could not decode tracker packet: {:?}", e),
        }
    }
}

/// Turns one tracker bundle into a result: `/faces i` carries the face count,
/// every `/<category> f` a score of the first face.
pub fn parse_result(bundle: &OscBundle) -> TrackerResult {
    let mut result = TrackerResult::default();
    let mut faces = None;

    let mut stack: Vec<&OscPacket> = bundle.content.iter().collect();
    while let Some(packet) = stack.pop() {
        let msg = match packet {
            OscPacket::Message(msg) => msg,
            OscPacket::Bundle(inner) => {
                stack.extend(inner.content.iter());
                continue;
            }
        };

        if msg.addr == FACES_ADDR {
            match msg.args.first() {
                Some(OscType::Int(n)) => faces = Some((*n).max(0) as usize),
                other => log::warn!("Tracker: unsupported face count {:?}", other),
            }
            continue;
        }

        let Ok(shape) = BlendShape::from_str(msg.addr.trim_start_matches('/')) else {
            log::debug!("Tracker: unknown address {}", msg.addr);
            continue;
        };

        match msg.args.first() {
            Some(OscType::Float(score)) => result.metrics.set(shape, *score),
            Some(OscType::Double(score)) => result.metrics.set(shape, *score as f32),
            other => log::warn!("Tracker: unsupported arg {:?} for {}", other, msg.addr),
        }
    }

    result.faces = faces.unwrap_or(if result.metrics.is_empty() { 0 } else { 1 });
    result
}
