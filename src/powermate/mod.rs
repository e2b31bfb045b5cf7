//! PowerMate Bluetooth knob.
//!
//! BLE communication with the Griffin PowerMate Bluetooth:
//!
//! - [`protocol`] - GATT identifiers and notification decoding
//! - [`events`] - gesture events and the delegate contract
//! - [`session`] - connection and serialized gesture dispatch

pub mod events;
pub mod protocol;
pub mod session;

pub use events::{KnobDelegate, KnobEvent};
pub use session::Powermate;
