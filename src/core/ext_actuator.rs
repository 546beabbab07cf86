use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use tokio::sync::mpsc::UnboundedSender;

use super::smoother::to_wire;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
pub enum Channel {
    R,
    G,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActuatorMessage {
    pub colour: Channel,
    pub value: u8,
}

#[derive(Deserialize)]
struct WireEntry {
    colour: Channel,
    value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelTable {
    pub r: Option<u8>,
    pub g: Option<u8>,
    pub b: Option<u8>,
}

/// Entries that don't parse or name an unknown colour are skipped.
pub fn parse_channel_table(body: &[u8]) -> anyhow::Result<ChannelTable> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_slice(body).context("colour table is not a JSON array")?;

    let mut table = ChannelTable::default();
    for entry in entries {
        let Ok(WireEntry { colour, value }) = serde_json::from_value::<WireEntry>(entry) else {
            continue;
        };
        let value = to_wire(value as f32);
        let slot = match colour {
            Channel::R => &mut table.r,
            Channel::G => &mut table.g,
            Channel::B => &mut table.b,
        };
        slot.get_or_insert(value);
    }
    Ok(table)
}

/// B is written locally, R and G only ever come from pulls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbPreview {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbPreview {
    pub fn set_local(&mut self, value: u8) -> bool {
        std::mem::replace(&mut self.b, value) != value
    }

    pub fn apply_pull(&mut self, table: &ChannelTable) -> bool {
        let before = *self;
        if let Some(r) = table.r {
            self.r = r;
        }
        if let Some(g) = table.g {
            self.g = g;
        }
        before != *self
    }

    pub fn css(&self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }
}

pub enum SyncEvent {
    Pushed(anyhow::Result<()>),
    Pulled(anyhow::Result<ChannelTable>),
}

pub struct ActuatorClient {
    client: reqwest::Client,
    url: Arc<str>,
    events: UnboundedSender<SyncEvent>,
    push_in_flight: bool,
    pull_in_flight: bool,
}

impl ActuatorClient {
    pub fn new(
        url: &str,
        timeout: Duration,
        events: UnboundedSender<SyncEvent>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Could not build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            events,
            push_in_flight: false,
            pull_in_flight: false,
        })
    }

    // skipped while the previous push is outstanding
    pub fn push(&mut self, value: u8) -> bool {
        if self.push_in_flight {
            return false;
        }
        self.push_in_flight = true;

        let client = self.client.clone();
        let url = self.url.clone();
        let events = self.events.clone();
        let message = ActuatorMessage {
            colour: Channel::B,
            value,
        };

        tokio::spawn(async move {
            let result = send_colour(&client, &url, &message).await;
            let _ = events.send(SyncEvent::Pushed(result));
        });
        true
    }

    pub fn pull(&mut self) -> bool {
        if self.pull_in_flight {
            return false;
        }
        self.pull_in_flight = true;

        let client = self.client.clone();
        let url = self.url.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = fetch_colours(&client, &url).await;
            let _ = events.send(SyncEvent::Pulled(result));
        });
        true
    }

    pub fn complete(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Pushed(_) => self.push_in_flight = false,
            SyncEvent::Pulled(_) => self.pull_in_flight = false,
        }
    }
}

async fn send_colour(
    client: &reqwest::Client,
    url: &str,
    message: &ActuatorMessage,
) -> anyhow::Result<()> {
    let resp = client
        .post(url)
        .json(message)
        .send()
        .await
        .with_context(|| format!("POST {} failed", url))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("POST {} returned {}: {}", url, status, body.trim());
    }
    Ok(())
}

async fn fetch_colours(client: &reqwest::Client, url: &str) -> anyhow::Result<ChannelTable> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?;

    let status = resp.status();
    if !status.is_success() {
        bail!("GET {} returned {}", url, status);
    }

    let body = resp.bytes().await.context("No payload in colour response")?;
    parse_channel_table(&body)
}
