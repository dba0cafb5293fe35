//! In-process transport
//!
//! Any number of peers per named channel; a frame sent by one peer is queued
//! for every other peer on the same channel. Used by the native tool and by
//! tests to stand in for the browser channels.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::RollTransport;
use crate::error::TransportError;

#[derive(Default)]
struct BusInner {
    next_peer: u64,
    /// channel -> (peer id, inbox)
    channels: HashMap<String, Vec<(u64, Rc<RefCell<VecDeque<String>>>)>>,
}

/// Shared in-memory message bus
#[derive(Clone, Default)]
pub struct LoopbackBus {
    inner: Rc<RefCell<BusInner>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a new peer to `channel`
    pub fn join(&self, channel: &str, name: &'static str) -> LoopbackTransport {
        let mut inner = self.inner.borrow_mut();
        inner.next_peer += 1;
        let id = inner.next_peer;
        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .push((id, inbox.clone()));

        LoopbackTransport {
            bus: self.clone(),
            channel: channel.to_string(),
            name,
            id,
            inbox,
            available: true,
        }
    }

    /// Peers currently connected to `channel`
    pub fn peers(&self, channel: &str) -> usize {
        self.inner
            .borrow()
            .channels
            .get(channel)
            .map_or(0, |peers| peers.len())
    }

    fn deliver(&self, channel: &str, from: u64, frame: &str) -> usize {
        let inner = self.inner.borrow();
        let Some(peers) = inner.channels.get(channel) else {
            return 0;
        };
        let mut delivered = 0;
        for (id, inbox) in peers {
            if *id != from {
                inbox.borrow_mut().push_back(frame.to_string());
                delivered += 1;
            }
        }
        delivered
    }

    fn leave(&self, channel: &str, id: u64) {
        let mut inner = self.inner.borrow_mut();
        if let Some(peers) = inner.channels.get_mut(channel) {
            peers.retain(|(peer, _)| *peer != id);
            if peers.is_empty() {
                inner.channels.remove(channel);
            }
        }
    }
}

/// One peer on a [`LoopbackBus`] channel
pub struct LoopbackTransport {
    bus: LoopbackBus,
    channel: String,
    name: &'static str,
    id: u64,
    inbox: Rc<RefCell<VecDeque<String>>>,
    available: bool,
}

impl LoopbackTransport {
    /// Simulate the channel going up or down
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Push a raw frame into this peer's inbox, as if received
    pub fn inject(&self, frame: &str) {
        self.inbox.borrow_mut().push_back(frame.to_string());
    }
}

impl RollTransport for LoopbackTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        if !self.available {
            return Err(TransportError::Unavailable(self.name));
        }
        self.bus.deliver(&self.channel, self.id, frame);
        Ok(())
    }

    fn recv(&mut self) -> Vec<String> {
        self.inbox.borrow_mut().drain(..).collect()
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.bus.leave(&self.channel, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_reach_other_peers_only() {
        let bus = LoopbackBus::new();
        let mut a = bus.join("room", "loopback");
        let mut b = bus.join("room", "loopback");
        let mut c = bus.join("other", "loopback");

        a.send("hello").unwrap();
        assert!(a.recv().is_empty());
        assert_eq!(b.recv(), vec!["hello".to_string()]);
        assert!(c.recv().is_empty());
    }

    #[test]
    fn test_drop_leaves_channel() {
        let bus = LoopbackBus::new();
        let a = bus.join("room", "loopback");
        {
            let _b = bus.join("room", "loopback");
            assert_eq!(bus.peers("room"), 2);
        }
        assert_eq!(bus.peers("room"), 1);
        drop(a);
        assert_eq!(bus.peers("room"), 0);
    }

    #[test]
    fn test_unavailable_send_fails() {
        let bus = LoopbackBus::new();
        let mut a = bus.join("room", "relay");
        a.set_available(false);
        assert_eq!(a.send("x"), Err(TransportError::Unavailable("relay")));
    }
}
