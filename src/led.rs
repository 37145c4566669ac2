//! APA102 LED strip framing and output.
//!
//! Wire format (SPI, MSB first):
//! - start frame: four `0x00` bytes
//! - per LED: `0b111LLLLL` (5-bit global brightness), then blue, green, red
//! - end frame: `0xFF, 0x00`

use crate::Color;
use embedded_hal::spi::SpiDevice as SpiBus;
use linux_embedded_hal::SpidevDevice;
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use std::io;
use std::path::Path;

const START_FRAME: [u8; 4] = [0x00; 4];
const END_FRAME: [u8; 2] = [0xFF, 0x00];
const LED_HEADER: u8 = 0b1110_0000;

/// Encode one full strip refresh where every LED shows `color`.
pub fn encode_frame(color: Color, brightness: u8, led_count: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(START_FRAME.len() + led_count * 4 + END_FRAME.len());
    frame.extend_from_slice(&START_FRAME);
    for _ in 0..led_count {
        frame.extend_from_slice(&[LED_HEADER | (brightness & 0b1_1111), color.b, color.g, color.r]);
    }
    frame.extend_from_slice(&END_FRAME);
    frame
}

/// The all-off frame: black at zero brightness.
pub fn off_frame(led_count: usize) -> Vec<u8> {
    encode_frame(Color::BLACK, 0, led_count)
}

/// Anything that can push a raw frame out to the strip.
pub trait LedStrip: Send {
    /// # Errors
    ///
    /// Returns the underlying I/O error if the frame could not be written.
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

impl<T: LedStrip + ?Sized> LedStrip for Box<T> {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).write_frame(frame)
    }
}

/// APA102 clock rate.
pub const SPI_SPEED_HZ: u32 = 1_000_000;

/// A strip on a Linux `spidev` node such as `/dev/spidev0.0`.
///
/// The node is configured on open (mode 0, 8 bits per word, MSB first, 1 MHz)
/// and each frame goes out as a single transfer.
pub struct SpiDevice {
    spi: SpidevDevice,
}

impl SpiDevice {
    /// # Errors
    ///
    /// Fails if the node cannot be opened or does not accept the SPI
    /// configuration.
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut spi = SpidevDevice::open(path).map_err(spi_error)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(SPI_SPEED_HZ)
            .lsb_first(false)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)?;
        tracing::info!("SPI {} configured at {} Hz", path.display(), SPI_SPEED_HZ);
        Ok(Self { spi })
    }
}

impl LedStrip for SpiDevice {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        SpiBus::write(&mut self.spi, frame).map_err(spi_error)
    }
}

fn spi_error(err: impl std::fmt::Debug) -> io::Error {
    io::Error::other(format!("SPI: {err:?}"))
}

/// Frames a [`MemoryStrip`] remembers before dropping the oldest.
pub const MEMORY_STRIP_HISTORY: usize = 64;

/// Keeps the most recent frames written, for headless runs and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryStrip {
    frames: Vec<Vec<u8>>,
}

impl MemoryStrip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&[u8]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl LedStrip for MemoryStrip {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        tracing::trace!("strip frame: {} bytes", frame.len());
        if self.frames.len() == MEMORY_STRIP_HISTORY {
            self.frames.remove(0);
        }
        self.frames.push(frame.to_vec());
        Ok(())
    }
}
