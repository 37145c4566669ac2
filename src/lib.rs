//! Core of a networked desk status light.
//!
//! The device shows a color/flash pattern on an APA102 LED strip, scrolls a
//! free-text status message on a character LCD, and is configured through a
//! line-based `KEY=value;` protocol that arrives over HTTP or a serial
//! console.
//!
//! Everything that changes over time is a small tick-driven state machine:
//! - [`sequencer`]: flash, then hold, then off
//! - [`announcer`]: show the acquired address for a few seconds
//! - [`scroll`]: walk the wrapped message across the LCD rows
//!
//! [`device::Device`] owns all of them plus the settings and user ids, and
//! [`runtime::run_device_loop`] drives it on a single thread.

pub mod announcer;
pub mod device;
pub mod error;
pub mod lcd;
pub mod led;
pub mod message;
pub mod network;
pub mod protocol;
pub mod runtime;
pub mod scroll;
pub mod sequencer;
pub mod serial;
pub mod server;
pub mod settings;
pub mod store;

pub use error::{Error, Result};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// ── Timing ─────────────────────────────────────────────────────────

/// Period of one tick of the device loop.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Ticks between flash on/off toggles (0.5 s).
pub const FLASH_PERIOD: u32 = 5;

/// Ticks the acquired address stays on screen after connecting (3 s).
pub const IP_DISPLAY_TICKS: u32 = 30;

/// Ticks between message scroll steps (2 s).
pub const SCROLL_PERIOD: u32 = 20;

// ── Capacities ─────────────────────────────────────────────────────

/// Longest message kept, in characters. Longer text is truncated.
pub const MAX_MESSAGE_LEN: usize = 240;

/// Longest serial input line, in characters.
pub const MAX_INPUT_LEN: usize = 256;

pub const USER_ID_COUNT: usize = 16;
pub const USER_ID_MAX_LEN: usize = 36;

// ── Device configuration ───────────────────────────────────────────

/// Hardware dimensions the state machines render into.
///
/// Passed explicitly to [`device::Device`] instead of living in globals, so
/// tests can build a device with any LCD size or strip length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    pub lcd_cols: usize,
    pub lcd_rows: usize,
    pub led_count: usize,
    /// 5-bit APA102 global brightness (0-31).
    pub brightness: u8,
}

impl DeviceConfig {
    /// Brightness as it goes on the wire; values above 31 are clamped.
    pub fn brightness_bits(&self) -> u8 {
        self.brightness.min(0b1_1111)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            lcd_cols: 20,
            lcd_rows: 4,
            led_count: 24,
            brightness: 7,
        }
    }
}

// ── Color ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

// ── Shutdown signal ────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// The device loop polls the flag once per tick, so shutdown takes at most
/// one tick period.
///
/// # Errors
///
/// Fails if a handler was already installed for this process.
pub fn setup_signal_handler() -> std::result::Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the device loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}
