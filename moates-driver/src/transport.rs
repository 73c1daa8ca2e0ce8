// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport capability.
//!
//! The engines only need a small surface: change the line rate during the
//! autobaud handshake, bounded reads, and directional purges. Everything is
//! 8-N-1 raw on both device families, so framing beyond the rate is fixed at
//! open time.

use std::io::{Read, Write};
use std::time::Duration;

use log::trace;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

use crate::error::{Error, Result};
use moates_proto::HIGH_BAUD;

/// Default bound on a single transport read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Bidirectional byte stream to a device.
///
/// A driver instance owns its transport exclusively; dropping the instance
/// closes it.
pub trait Transport {
    fn is_open(&self) -> bool;

    /// Change the line rate, keeping 8-N-1 framing.
    fn set_framing(&mut self, baud: u32) -> Result<()>;

    /// Bound every subsequent read.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Send all of `bytes`. The hardware dislikes dribbled commands, so a
    /// frame always goes out in one call.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read exactly `buf.len()` bytes or fail with a timeout.
    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Discard anything the device sent that we have not read.
    fn purge_rx(&mut self) -> Result<()>;

    /// Discard anything queued for the device that has not left the host.
    fn purge_tx(&mut self) -> Result<()>;
}

/// Production backend over a system serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `path` at the device's preferred rate.
    pub fn open(path: &str) -> Result<Self> {
        Self::open_at(path, HIGH_BAUD)
    }

    pub fn open_at(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(DEFAULT_READ_TIMEOUT)
            .open()
            .map_err(|e| Error::TransportIo(e.into()))?;
        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn is_open(&self) -> bool {
        true
    }

    fn set_framing(&mut self, baud: u32) -> Result<()> {
        trace!("line rate -> {baud}");
        self.port
            .set_baud_rate(baud)
            .map_err(|e| Error::TransportIo(e.into()))
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| Error::TransportIo(e.into()))
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("tx {} bytes: {:02X?}", bytes.len(), &bytes[..bytes.len().min(32)]);
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.port.read_exact(buf)?;
        trace!("rx {} bytes: {:02X?}", buf.len(), &buf[..buf.len().min(32)]);
        Ok(())
    }

    fn purge_rx(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| Error::TransportIo(e.into()))
    }

    fn purge_tx(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::Output)
            .map_err(|e| Error::TransportIo(e.into()))
    }
}
