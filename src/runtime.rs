//! The device loop: a plain `std::thread` that owns the [`Device`] and
//! drives it on a fixed tick.
//!
//! The async side (HTTP handlers, network association) never touches device
//! state. It sends [`DeviceEvent`]s through an `mpsc` channel, and the loop
//! handles them between ticks, in arrival order.

use crate::device::{Device, Exit, HttpAction, StatusReport};
use crate::lcd::CharDisplay;
use crate::led::LedStrip;
use crate::{Result, TICK_PERIOD, is_running};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;
use tokio::sync::oneshot;

/// Progress of a network association attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkEvent {
    Connecting { ssid: String },
    /// One failed attempt; another follows after a second.
    Retry,
    Connected { addr: Ipv4Addr, dhcp: bool },
    Failed,
}

/// An HTTP route waiting on the device loop for its answer.
#[derive(Debug)]
pub struct DeviceRequest {
    pub user_id: Option<String>,
    pub action: HttpAction,
    pub reply: oneshot::Sender<Result<StatusReport>>,
}

#[derive(Debug)]
pub enum DeviceEvent {
    Request(DeviceRequest),
    Network(NetworkEvent),
}

/// What the loop hands back when it stops.
pub struct Stopped<S: LedStrip, D: CharDisplay> {
    pub exit: Exit,
    pub device: Device<S, D>,
    /// Serial input survives a restart; the reader thread keeps running.
    pub serial: Receiver<u8>,
}

/// Tick `device` every [`TICK_PERIOD`] until a command requests an exit or
/// `running` is cleared.
///
/// Events are handled between ticks. A tick that runs late starts the next
/// period from now instead of firing the missed ticks back to back.
pub fn run_device_loop<S: LedStrip, D: CharDisplay>(
    mut device: Device<S, D>,
    events: Receiver<DeviceEvent>,
    serial: Receiver<u8>,
    running: Arc<AtomicBool>,
) -> Stopped<S, D> {
    tracing::info!("Device loop started.");
    let mut deadline = Instant::now() + TICK_PERIOD;
    let mut events_open = true;

    let exit = loop {
        let now = Instant::now();
        if now >= deadline {
            device.tick(serial.try_iter());

            if let Some(exit) = device.exit_requested() {
                break exit;
            }
            if !is_running(&running) {
                break Exit::Shutdown;
            }

            deadline += TICK_PERIOD;
            if deadline <= now {
                tracing::debug!("Tick overran; skipping missed ticks.");
                deadline = now + TICK_PERIOD;
            }
            continue;
        }

        let wait = deadline - now;
        if !events_open {
            thread::sleep(wait);
            continue;
        }
        match events.recv_timeout(wait) {
            Ok(event) => device.handle_event(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => events_open = false,
        }
    };

    tracing::info!("Device loop stopped: {:?}", exit);
    Stopped {
        exit,
        device,
        serial,
    }
}
