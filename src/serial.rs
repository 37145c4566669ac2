//! Serial console input.
//!
//! A background thread only moves raw bytes into a channel. Assembling them
//! into lines and dispatching happens inside the device tick, so console
//! commands are processed in the same sequence as everything else.

use crate::MAX_INPUT_LEN;
use std::io::Read;
use std::sync::mpsc::{self, Receiver};
use std::thread;

/// Builds command lines one byte at a time.
#[derive(Clone, Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns the finished line when `byte` is `\n`.
    ///
    /// `\b` removes the last character and `\r` is dropped. Once the line holds
    /// [`MAX_INPUT_LEN`] bytes, further input is discarded until the newline.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'\n' => {
                let line = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                Some(line)
            }
            b'\r' => None,
            0x08 => {
                // Drop continuation bytes too, so a whole character goes.
                while let Some(byte) = self.buffer.pop() {
                    if byte & 0b1100_0000 != 0b1000_0000 {
                        break;
                    }
                }
                None
            }
            _ => {
                if self.buffer.len() < MAX_INPUT_LEN {
                    self.buffer.push(byte);
                }
                None
            }
        }
    }
}

/// Forward everything `reader` produces into a channel until EOF.
pub fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> Receiver<u8> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; 64];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    tracing::info!("Serial input closed.");
                    break;
                }
                Ok(n) => {
                    if buf[..n].iter().any(|&b| tx.send(b).is_err()) {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("Serial read error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
