//! Network association, as far as the device cares about it.
//!
//! The WiFi link itself is managed by the host. Associating means finding
//! the IPv4 address the device is reachable on, retrying once per second
//! and reporting progress to the device loop so it can update the LCD.

use crate::runtime::{DeviceEvent, NetworkEvent};
use crate::settings::{Addressing, Settings};
use crate::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Default number of one-second retries before giving up.
pub const MAX_CONNECT_RETRIES: u32 = 20;

/// Anything routed here works; UDP `connect` sends no packets.
const PROBE_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(192, 0, 2, 1), 9);

pub trait Network {
    /// One association attempt.
    ///
    /// # Errors
    ///
    /// `NetworkAssociationFailure` if no usable address is available yet.
    fn associate(&mut self, settings: &Settings) -> Result<Ipv4Addr>;
}

/// Uses the host's own interfaces.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostNetwork;

impl Network for HostNetwork {
    fn associate(&mut self, settings: &Settings) -> Result<Ipv4Addr> {
        let failure = || Error::NetworkAssociationFailure(settings.ssid.clone());
        match settings.addressing {
            // Binding only succeeds once the address is up on some interface.
            Addressing::Static { ip, .. } => {
                UdpSocket::bind((ip, 0)).map_err(|_| failure())?;
                Ok(ip)
            }
            Addressing::Dhcp => {
                let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
                socket.connect(PROBE_ADDR).map_err(|_| failure())?;
                match socket.local_addr()?.ip() {
                    IpAddr::V4(ip) if !ip.is_unspecified() && !ip.is_loopback() => Ok(ip),
                    _ => Err(failure()),
                }
            }
        }
    }
}

/// Try to associate up to `retries` times, one second apart.
///
/// # Errors
///
/// `NetworkAssociationFailure` once the retries are used up.
pub async fn connect<N: Network>(
    network: &mut N,
    settings: &Settings,
    retries: u32,
    events: &Sender<DeviceEvent>,
) -> Result<Ipv4Addr> {
    let notify = |event| {
        // The device loop going away only means we are shutting down.
        let _ = events.send(DeviceEvent::Network(event));
    };

    tracing::info!("Connecting to '{}'.", settings.ssid);
    notify(NetworkEvent::Connecting {
        ssid: settings.ssid.clone(),
    });

    let mut attempt = 0;
    loop {
        match network.associate(settings) {
            Ok(addr) => {
                tracing::info!("Connected. IP: {}", addr);
                notify(NetworkEvent::Connected {
                    addr,
                    dhcp: settings.uses_dhcp(),
                });
                return Ok(addr);
            }
            Err(err) if attempt >= retries => {
                tracing::warn!("{}", err);
                notify(NetworkEvent::Failed);
                return Err(Error::NetworkAssociationFailure(settings.ssid.clone()));
            }
            Err(_) => {
                attempt += 1;
                notify(NetworkEvent::Retry);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
