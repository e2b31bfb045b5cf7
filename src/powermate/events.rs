//! Gesture events and the delegate contract.

use async_trait::async_trait;
use std::time::Duration;

/// A discrete gesture decoded from a knob notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnobEvent {
    /// Knob released before the hold threshold.
    Press,
    /// Knob released after being held; carries the hold time.
    LongPress(Duration),
    Clockwise,
    Counterclockwise,
    PressClockwise,
    PressCounterclockwise,
}

/// Receiver for knob gestures and connection lifecycle.
///
/// The session owns its delegate and awaits each handler to completion
/// before reading the next notification, so implementations may hold mutable
/// state without locking. Handlers stall gesture delivery while they run;
/// keep them shorter than the transport's notification timeout.
#[async_trait]
pub trait KnobDelegate: Send {
    async fn on_connect(&mut self);
    async fn on_disconnect(&mut self);
    async fn on_battery_report(&mut self, percent: u8);
    async fn on_press(&mut self);
    async fn on_long_press(&mut self, held: Duration);
    async fn on_clockwise(&mut self);
    async fn on_counterclockwise(&mut self);
    async fn on_press_clockwise(&mut self);
    async fn on_press_counterclockwise(&mut self);
}
