//! PowerMate → LMS bridge
//!
//! Controls a Logitech Media Server player with a Griffin PowerMate
//! Bluetooth knob:
//! - turning the knob steps the player's volume
//! - a short press toggles play/pause
//! - a long press hands control to the next player on the server

pub mod config;
pub mod controller;
pub mod directory;
pub mod feedback;
pub mod lms;
pub mod powermate;
