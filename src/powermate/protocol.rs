//! PowerMate GATT protocol.
//!
//! The knob notifies single-byte gesture codes on its vendor characteristic.
//! A held press is reported on release with the hold time folded into the
//! code, one code per whole second up to the firmware's ten second cap.

use std::time::Duration;
use uuid::{uuid, Uuid};

use crate::powermate::events::KnobEvent;

/// PowerMate vendor service.
pub const SERVICE_UUID: Uuid = uuid!("25598cf7-4240-40a6-9910-080f19f91ebc");
/// Characteristic notifying gesture codes.
pub const KNOB_CHARACTERISTIC: Uuid = uuid!("9cf53570-ddd9-47f3-ba63-09acefc60415");
/// Standard GATT battery level characteristic.
pub const BATTERY_CHARACTERISTIC: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

const CODE_PRESS: u8 = 101;
const CODE_CLOCKWISE: u8 = 103;
const CODE_COUNTERCLOCKWISE: u8 = 104;
const CODE_PRESS_CLOCKWISE: u8 = 105;
const CODE_PRESS_COUNTERCLOCKWISE: u8 = 106;
/// First held-release code; 114 means held for one second.
const CODE_HOLD_BASE: u8 = 114;
/// The firmware stops counting at ten seconds.
const CODE_HOLD_MAX: u8 = CODE_HOLD_BASE + 9;

/// Decode one notification byte. Unknown codes return `None`.
pub fn decode(code: u8) -> Option<KnobEvent> {
    match code {
        CODE_PRESS => Some(KnobEvent::Press),
        CODE_CLOCKWISE => Some(KnobEvent::Clockwise),
        CODE_COUNTERCLOCKWISE => Some(KnobEvent::Counterclockwise),
        CODE_PRESS_CLOCKWISE => Some(KnobEvent::PressClockwise),
        CODE_PRESS_COUNTERCLOCKWISE => Some(KnobEvent::PressCounterclockwise),
        CODE_HOLD_BASE..=CODE_HOLD_MAX => Some(KnobEvent::LongPress(Duration::from_secs(
            u64::from(code - CODE_HOLD_BASE) + 1,
        ))),
        _ => None,
    }
}
