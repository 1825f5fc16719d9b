//! Participant session management module
//!
//! Tracks connected participants, enforces avatar identity uniqueness,
//! broadcasts presence snapshots, and relays signaling messages.

mod hub;
mod participant;
#[allow(dead_code)]
mod registry;

pub use hub::*;
pub use participant::*;
pub use registry::*;
