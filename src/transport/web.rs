//! Browser transports
//!
//! - `BroadcastChannel` scoped by room (same origin, same browser)
//! - A `SharedWorker` hub reachable from every tab of the browser
//! - A WebSocket relay for other devices
//!
//! Each keeps its message handler alive for its own lifetime and detaches it
//! on drop, so tearing the engine down leaves no callbacks behind.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{BroadcastChannel, MessageEvent, MessagePort, SharedWorker, WebSocket};

use super::{RollTransport, channel_name};
use crate::error::TransportError;

type Inbox = Rc<RefCell<VecDeque<String>>>;

fn inbox_handler(inbox: &Inbox) -> Closure<dyn FnMut(MessageEvent)> {
    let inbox = inbox.clone();
    Closure::<dyn FnMut(_)>::new(move |event: MessageEvent| {
        if let Some(text) = event.data().as_string() {
            inbox.borrow_mut().push_back(text);
        }
    })
}

fn js_reason(err: JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

/// Room-scoped `BroadcastChannel`
pub struct BroadcastChannelTransport {
    channel: BroadcastChannel,
    inbox: Inbox,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
}

impl BroadcastChannelTransport {
    pub fn open(room: &str) -> Result<Self, TransportError> {
        let channel = BroadcastChannel::new(&channel_name(room))
            .map_err(|_| TransportError::Unavailable("broadcast"))?;
        let inbox = Inbox::default();
        let on_message = inbox_handler(&inbox);
        channel.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        Ok(Self {
            channel,
            inbox,
            _on_message: on_message,
        })
    }
}

impl RollTransport for BroadcastChannelTransport {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        self.channel
            .post_message(&JsValue::from_str(frame))
            .map_err(|e| TransportError::Send {
                channel: "broadcast",
                reason: js_reason(e),
            })
    }

    fn recv(&mut self) -> Vec<String> {
        self.inbox.borrow_mut().drain(..).collect()
    }
}

impl Drop for BroadcastChannelTransport {
    fn drop(&mut self) {
        self.channel.set_onmessage(None);
        self.channel.close();
    }
}

/// Port on the shared-worker hub (`web/dice_hub.js`)
pub struct SharedWorkerTransport {
    _worker: SharedWorker,
    port: MessagePort,
    inbox: Inbox,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
}

impl SharedWorkerTransport {
    /// Connect to the hub script; one worker instance per room
    pub fn connect(script_url: &str, room: &str) -> Result<Self, TransportError> {
        let worker = SharedWorker::new_with_str(script_url, &channel_name(room))
            .map_err(|_| TransportError::Unavailable("shared-worker"))?;
        let port = worker.port();
        let inbox = Inbox::default();
        let on_message = inbox_handler(&inbox);
        port.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        port.start();

        Ok(Self {
            _worker: worker,
            port,
            inbox,
            _on_message: on_message,
        })
    }
}

impl RollTransport for SharedWorkerTransport {
    fn name(&self) -> &'static str {
        "shared-worker"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        self.port
            .post_message(&JsValue::from_str(frame))
            .map_err(|e| TransportError::Send {
                channel: "shared-worker",
                reason: js_reason(e),
            })
    }

    fn recv(&mut self) -> Vec<String> {
        self.inbox.borrow_mut().drain(..).collect()
    }
}

impl Drop for SharedWorkerTransport {
    fn drop(&mut self) {
        self.port.set_onmessage(None);
        // Ports give no close event; tell the hub to forget this one
        let _ = self.port.post_message(&JsValue::from_str("bye"));
        self.port.close();
    }
}

/// Cross-device relay over a WebSocket
///
/// The relay forwards text frames verbatim to the other sockets of the room.
pub struct WebSocketRelay {
    socket: WebSocket,
    inbox: Inbox,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
}

impl WebSocketRelay {
    pub fn connect(url: &str) -> Result<Self, TransportError> {
        let socket = WebSocket::new(url).map_err(|_| TransportError::Unavailable("relay"))?;
        let inbox = Inbox::default();
        let on_message = inbox_handler(&inbox);
        socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        log::info!("Relay connecting to {url}");

        Ok(Self {
            socket,
            inbox,
            _on_message: on_message,
        })
    }
}

impl RollTransport for WebSocketRelay {
    fn name(&self) -> &'static str {
        "relay"
    }

    fn is_available(&self) -> bool {
        self.socket.ready_state() == WebSocket::OPEN
    }

    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        self.socket
            .send_with_str(frame)
            .map_err(|e| TransportError::Send {
                channel: "relay",
                reason: js_reason(e),
            })
    }

    fn recv(&mut self) -> Vec<String> {
        self.inbox.borrow_mut().drain(..).collect()
    }
}

impl Drop for WebSocketRelay {
    fn drop(&mut self) {
        self.socket.set_onmessage(None);
        let _ = self.socket.close();
    }
}
