use rosc::{OscBundle, OscMessage, OscPacket, OscType};

use super::{
    ext_actuator::RgbPreview, METRICS_PREFIX, OVERLAY_ADDR, PREVIEW_PREFIX, REVEAL_PREFIX,
    SCENE_ADDR,
};

/// Messages for the presentational side: preview fields, overlay, reveal
/// text, metric bars and scene changes.
pub trait UiBundle {
    fn new_bundle() -> Self;
    fn send_preview(&mut self, preview: &RgbPreview);
    fn send_overlay(&mut self, filled: bool);
    fn send_reveal(&mut self, line: usize, text: &str, x: i32, y: i32, spacing: i32);
    fn send_metric(&mut self, name: &str, value: f32);
    fn send_navigate(&mut self, view: &str);
    fn serialize(self) -> Option<Vec<u8>>;
}

impl UiBundle for OscBundle {
    fn new_bundle() -> OscBundle {
        OscBundle {
            timetag: rosc::OscTime {
                seconds: 0,
                fractional: 0,
            },
            content: Vec::new(),
        }
    }
    fn send_preview(&mut self, preview: &RgbPreview) {
        log::trace!("Sending preview {}", preview.css());
        for (name, value) in [("red", preview.r), ("green", preview.g), ("blue", preview.b)] {
            self.content.push(OscPacket::Message(OscMessage {
                addr: format!("{}{}", PREVIEW_PREFIX, name),
                args: vec![OscType::Int(value as i32)],
            }));
        }
        self.content.push(OscPacket::Message(OscMessage {
            addr: format!("{}colour", PREVIEW_PREFIX),
            args: vec![OscType::String(preview.css())],
        }));
    }
    fn send_overlay(&mut self, filled: bool) {
        log::trace!("Sending overlay filled = {}", filled);
        self.content.push(OscPacket::Message(OscMessage {
            addr: OVERLAY_ADDR.to_string(),
            args: vec![OscType::Bool(filled)],
        }));
    }
    fn send_reveal(&mut self, line: usize, text: &str, x: i32, y: i32, spacing: i32) {
        log::trace!("Sending reveal line {} = {:?}", line, text);
        self.content.push(OscPacket::Message(OscMessage {
            addr: format!("{}{}", REVEAL_PREFIX, line),
            args: vec![
                OscType::String(text.to_string()),
                OscType::Int(x),
                OscType::Int(y),
                OscType::Int(spacing),
            ],
        }));
    }
    fn send_metric(&mut self, name: &str, value: f32) {
        self.content.push(OscPacket::Message(OscMessage {
            addr: format!("{}{}", METRICS_PREFIX, name),
            args: vec![OscType::Float(value)],
        }));
    }
    fn send_navigate(&mut self, view: &str) {
        log::trace!("Sending navigate {}", view);
        self.content.insert(
            0,
            OscPacket::Message(OscMessage {
                addr: SCENE_ADDR.to_string(),
                args: vec![OscType::String(view.to_string())],
            }),
        );
    }
    fn serialize(self) -> Option<Vec<u8>> {
        if !self.content.is_empty() {
            rosc::encoder::encode(&OscPacket::Bundle(self)).ok()
        } else {
            None
        }
    }
}
