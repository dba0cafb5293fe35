//! Roll propagation
//!
//! Only roll parameters travel: `{type, seed, count, sides, room, source}` as
//! JSON text. Every channel (same-device broadcast, shared worker, cross-device
//! relay) implements [`RollTransport`]; the [`TransportHub`] publishes to all
//! available channels and filters what comes back.

pub mod loopback;
#[cfg(target_arch = "wasm32")]
pub mod web;

use serde::{Deserialize, Serialize};

use crate::error::{RollError, TransportError};
use crate::sim::{DieKind, RollRequest, check_count};

pub use loopback::{LoopbackBus, LoopbackTransport};

/// `type` tag of a roll message
pub const MESSAGE_TYPE: &str = "dice-roll";

/// Room-scoped channel name shared by the same-device channels
pub fn channel_name(room: &str) -> String {
    format!("dice-tray:{room}")
}

/// Synchronisation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub seed: u32,
    pub count: u32,
    pub sides: u32,
    pub room: String,
    /// Instance id of the sending tab
    pub source: String,
    /// Display name of the roller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RollMessage {
    pub fn from_request(request: &RollRequest) -> Self {
        Self {
            kind: MESSAGE_TYPE.to_string(),
            seed: request.seed,
            count: request.count,
            sides: request.sides.sides(),
            room: request.room.clone(),
            source: request.origin_instance.clone(),
            name: (!request.triggered_by.is_empty()).then(|| request.triggered_by.clone()),
        }
    }

    pub fn to_request(&self) -> Result<RollRequest, RollError> {
        let request = RollRequest::new(
            self.seed,
            self.count,
            self.sides,
            self.room.clone(),
            self.source.clone(),
        )?;
        let name = self.name.clone().unwrap_or_else(|| self.source.clone());
        Ok(request.with_triggered_by(name))
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Encode(e.to_string()))
    }

    /// Same throw as another message
    fn same_throw(&self, other: &RollMessage) -> bool {
        self.seed == other.seed
            && self.count == other.count
            && self.sides == other.sides
            && self.source == other.source
    }
}

/// Why an incoming frame was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discard {
    /// Not JSON, or missing/mistyped seed, count, sides, room or source
    Malformed,
    WrongType,
    WrongRoom,
    /// Our own broadcast coming back
    SelfOrigin,
    BadParameters,
}

/// Decode and filter one incoming frame for this room and instance
pub fn decode_frame(frame: &str, room: &str, instance_id: &str) -> Result<RollMessage, Discard> {
    let msg: RollMessage = serde_json::from_str(frame).map_err(|_| Discard::Malformed)?;
    if msg.kind != MESSAGE_TYPE {
        return Err(Discard::WrongType);
    }
    if msg.room != room {
        return Err(Discard::WrongRoom);
    }
    if msg.source == instance_id {
        return Err(Discard::SelfOrigin);
    }
    if check_count(msg.count).is_err() || DieKind::from_sides(msg.sides).is_none() {
        return Err(Discard::BadParameters);
    }
    Ok(msg)
}

/// One way of reaching other clients in the room
pub trait RollTransport {
    /// Short channel name for logs
    fn name(&self) -> &'static str;

    /// Whether the channel can currently send
    fn is_available(&self) -> bool;

    fn send(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Frames received since the last call
    fn recv(&mut self) -> Vec<String>;
}

/// The set of channels a client publishes to and listens on
pub struct TransportHub {
    room: String,
    instance_id: String,
    transports: Vec<Box<dyn RollTransport>>,
}

impl TransportHub {
    pub fn new(room: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            instance_id: instance_id.into(),
            transports: Vec::new(),
        }
    }

    pub fn add(&mut self, transport: Box<dyn RollTransport>) {
        log::info!(
            "Transport added: {} (available: {})",
            transport.name(),
            transport.is_available()
        );
        self.transports.push(transport);
    }

    /// Drop every channel (closes browser handles)
    pub fn clear(&mut self) {
        self.transports.clear();
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    pub fn available(&self) -> Vec<&'static str> {
        self.transports
            .iter()
            .filter(|t| t.is_available())
            .map(|t| t.name())
            .collect()
    }

    /// Send to every available channel; returns how many accepted the frame
    pub fn publish(&mut self, msg: &RollMessage) -> usize {
        let frame = match msg.encode() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("{e}");
                return 0;
            }
        };

        let mut delivered = 0;
        for transport in self.transports.iter_mut().filter(|t| t.is_available()) {
            match transport.send(&frame) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("{e}"),
            }
        }

        if delivered == 0 && !self.transports.is_empty() {
            log::debug!("Roll seed={} reached no transport", msg.seed);
        }
        delivered
    }

    /// Collect accepted messages from every channel, one copy per throw
    pub fn poll(&mut self) -> Vec<RollMessage> {
        let mut accepted: Vec<RollMessage> = Vec::new();
        for transport in &mut self.transports {
            for frame in transport.recv() {
                match decode_frame(&frame, &self.room, &self.instance_id) {
                    Ok(msg) => {
                        if !accepted.iter().any(|m| m.same_throw(&msg)) {
                            accepted.push(msg);
                        }
                    }
                    Err(reason) => {
                        log::debug!("Dropped frame from {}: {:?}", transport.name(), reason);
                    }
                }
            }
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seed: u32, room: &str, source: &str) -> String {
        format!(
            r#"{{"type":"dice-roll","seed":{seed},"count":2,"sides":6,"room":"{room}","source":"{source}"}}"#
        )
    }

    #[test]
    fn test_decode_accepts_valid_frame() {
        let msg = decode_frame(&frame(5, "tavern", "other"), "tavern", "me").unwrap();
        assert_eq!(msg.seed, 5);
        assert_eq!(msg.name, None);
        let req = msg.to_request().unwrap();
        assert_eq!(req.sides, DieKind::D6);
        assert_eq!(req.triggered_by, "other");
    }

    #[test]
    fn test_decode_filters() {
        assert_eq!(decode_frame("not json", "r", "me"), Err(Discard::Malformed));
        assert_eq!(
            decode_frame(r#"{"type":"dice-roll","count":2,"sides":6,"room":"r","source":"x"}"#, "r", "me"),
            Err(Discard::Malformed)
        );
        assert_eq!(
            decode_frame(r#"{"type":"dice-roll","seed":-1,"count":2,"sides":6,"room":"r","source":"x"}"#, "r", "me"),
            Err(Discard::Malformed)
        );
        assert_eq!(
            decode_frame(&frame(1, "r", "x").replace("dice-roll", "chat"), "r", "me"),
            Err(Discard::WrongType)
        );
        assert_eq!(decode_frame(&frame(1, "elsewhere", "x"), "r", "me"), Err(Discard::WrongRoom));
        assert_eq!(decode_frame(&frame(1, "r", "me"), "r", "me"), Err(Discard::SelfOrigin));
        assert_eq!(
            decode_frame(&frame(1, "r", "x").replace("\"sides\":6", "\"sides\":7"), "r", "me"),
            Err(Discard::BadParameters)
        );
        assert_eq!(
            decode_frame(&frame(1, "r", "x").replace("\"count\":2", "\"count\":0"), "r", "me"),
            Err(Discard::BadParameters)
        );
    }

    #[test]
    fn test_wire_shape() {
        let req = RollRequest::new(777, 3, 20, "tavern", "tab-1")
            .unwrap()
            .with_triggered_by("Ada");
        let json: serde_json::Value =
            serde_json::from_str(&RollMessage::from_request(&req).encode().unwrap()).unwrap();
        assert_eq!(json["type"], "dice-roll");
        assert_eq!(json["seed"], 777);
        assert_eq!(json["count"], 3);
        assert_eq!(json["sides"], 20);
        assert_eq!(json["room"], "tavern");
        assert_eq!(json["source"], "tab-1");
        assert_eq!(json["name"], "Ada");
    }

    #[test]
    fn test_hub_dedupes_redundant_channels() {
        let bus_a = LoopbackBus::new();
        let bus_b = LoopbackBus::new();
        let mut sender = TransportHub::new("r", "sender");
        sender.add(Box::new(bus_a.join("r", "broadcast")));
        sender.add(Box::new(bus_b.join("r", "worker")));
        let mut receiver = TransportHub::new("r", "receiver");
        receiver.add(Box::new(bus_a.join("r", "broadcast")));
        receiver.add(Box::new(bus_b.join("r", "worker")));

        let req = RollRequest::new(9, 1, 8, "r", "sender").unwrap();
        assert_eq!(sender.publish(&RollMessage::from_request(&req)), 2);
        let got = receiver.poll();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].seed, 9);
        assert!(receiver.poll().is_empty());
    }

    #[test]
    fn test_publish_skips_unavailable() {
        let bus = LoopbackBus::new();
        let mut hub = TransportHub::new("r", "me");
        let mut down = bus.join("r", "relay");
        down.set_available(false);
        hub.add(Box::new(down));
        let req = RollRequest::new(1, 1, 6, "r", "me").unwrap();
        assert_eq!(hub.publish(&RollMessage::from_request(&req)), 0);
        assert!(hub.available().is_empty());
    }
}
