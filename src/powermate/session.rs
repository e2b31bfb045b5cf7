//! PowerMate connection and gesture dispatch.
//!
//! One session owns the BLE link and a single dispatch task. The task is the
//! sole owner of the delegate: each notification is decoded and its handler
//! awaited to completion before the next one is read, so delegate state is
//! never touched by two gestures at once.

use anyhow::{anyhow, Result};
use btleplug::api::{
    BDAddr, Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter, ValueNotification,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::powermate::events::{KnobDelegate, KnobEvent};
use crate::powermate::protocol;

/// How long to scan before giving up on the configured address.
const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

/// A connected PowerMate delivering gestures to its delegate.
pub struct Powermate {
    peripheral: Peripheral,
    shutdown: CancellationToken,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl Powermate {
    /// Scan for the knob at `address`, connect, subscribe to its gesture and
    /// battery notifications, and start dispatching to `delegate`.
    pub async fn connect(address: BDAddr, delegate: Box<dyn KnobDelegate>) -> Result<Self> {
        let peripheral = find_peripheral(address).await?;
        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let characteristics = peripheral.characteristics();
        let knob = characteristics
            .iter()
            .find(|c| c.uuid == protocol::KNOB_CHARACTERISTIC)
            .ok_or_else(|| anyhow!("no knob characteristic; is {address} a PowerMate?"))?;
        peripheral.subscribe(knob).await?;

        match characteristics
            .iter()
            .find(|c| c.uuid == protocol::BATTERY_CHARACTERISTIC)
        {
            Some(battery) => {
                if let Err(e) = peripheral.subscribe(battery).await {
                    debug!("Battery notifications unavailable: {e}");
                }
            }
            None => debug!("No battery characteristic exposed"),
        }

        info!("Connected to {address}");

        let notifications = peripheral.notifications().await?;
        let shutdown = CancellationToken::new();
        let dispatch = tokio::spawn(dispatch_loop(notifications, delegate, shutdown.clone()));

        Ok(Self {
            peripheral,
            shutdown,
            dispatch: Mutex::new(Some(dispatch)),
        })
    }

    /// Stop dispatching and release the connection.
    ///
    /// Safe to call more than once; only the first call does any work. An
    /// in-flight gesture handler is awaited, never cancelled.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        let handle = self.dispatch.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
            if let Err(e) = self.peripheral.disconnect().await {
                debug!("Disconnect failed: {e}");
            }
            info!("PowerMate connection released");
        }
    }
}

/// Scan until a peripheral with the requested address shows up.
async fn find_peripheral(address: BDAddr) -> Result<Peripheral> {
    let manager = Manager::new().await?;
    let central = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no Bluetooth adapter available"))?;

    let mut events = central.events().await?;
    central.start_scan(ScanFilter::default()).await?;
    info!("Scanning for PowerMate at {address}");

    let found = tokio::time::timeout(SCAN_TIMEOUT, async {
        // Known peripherals don't re-announce; check the cache first.
        for peripheral in central.peripherals().await.unwrap_or_default() {
            if peripheral.address() == address {
                return Ok(peripheral);
            }
        }
        discover(&central, &mut events, address).await
    })
    .await;

    if let Err(e) = central.stop_scan().await {
        debug!("Failed to stop scan: {e}");
    }

    match found {
        Ok(peripheral) => peripheral,
        Err(_) => Err(anyhow!(
            "PowerMate {address} not found after {}s scan",
            SCAN_TIMEOUT.as_secs()
        )),
    }
}

async fn discover(
    central: &Adapter,
    events: &mut Pin<Box<dyn Stream<Item = CentralEvent> + Send>>,
    address: BDAddr,
) -> Result<Peripheral> {
    while let Some(event) = events.next().await {
        if let CentralEvent::DeviceDiscovered(id) = event {
            let peripheral = central.peripheral(&id).await?;
            if peripheral.address() == address {
                return Ok(peripheral);
            }
        }
    }
    Err(anyhow!("scan ended without finding {address}"))
}

async fn dispatch_loop(
    mut notifications: NotificationStream,
    mut delegate: Box<dyn KnobDelegate>,
    shutdown: CancellationToken,
) {
    delegate.on_connect().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            item = notifications.next() => {
                match item {
                    Some(notification) => {
                        handle_notification(notification, delegate.as_mut()).await;
                    }
                    None => {
                        // Stream end means the link dropped.
                        warn!("Notification stream ended");
                        delegate.on_disconnect().await;
                        break;
                    }
                }
            }
        }
    }
}

async fn handle_notification(notification: ValueNotification, delegate: &mut dyn KnobDelegate) {
    if notification.uuid == protocol::BATTERY_CHARACTERISTIC {
        if let Some(&percent) = notification.value.first() {
            delegate.on_battery_report(percent).await;
        }
        return;
    }

    let Some(&code) = notification.value.first() else {
        return;
    };

    match protocol::decode(code) {
        Some(KnobEvent::Press) => delegate.on_press().await,
        Some(KnobEvent::LongPress(held)) => delegate.on_long_press(held).await,
        Some(KnobEvent::Clockwise) => delegate.on_clockwise().await,
        Some(KnobEvent::Counterclockwise) => delegate.on_counterclockwise().await,
        Some(KnobEvent::PressClockwise) => delegate.on_press_clockwise().await,
        Some(KnobEvent::PressCounterclockwise) => delegate.on_press_counterclockwise().await,
        None => trace!("Unknown knob code: {code:#04x}"),
    }
}
