//! WebSocket server module
//!
//! Handles participant connections and routes their messages to the
//! session hub.

#[allow(dead_code)]
mod protocol;
mod websocket;

pub use protocol::*;
pub use websocket::*;
