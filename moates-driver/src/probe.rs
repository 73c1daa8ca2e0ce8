// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Autobaud handshake and device identity.
//!
//! Both families prefer 921 600 baud but power up listening at 115 200. The
//! probe first tries the high rate; if the device does not identify itself it
//! drops to the fallback rate, asks for a speed bump, returns to the high
//! rate and tries once more. The second failure is `DeviceNotFound`; there
//! are no other retries anywhere in the driver.

use std::fmt;

use log::debug;

use crate::error::{Error, Result};
use crate::transport::Transport;
use moates_proto::{frame, ACK, FALLBACK_BAUD, HIGH_BAUD, SERIAL_NUMBER_LEN};

/// Version information returned by the `VV` probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub hardware_version: u8,
    pub firmware_version: u8,
    pub hardware_version_char: u8,
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.hardware_version, self.firmware_version, self.hardware_version_char as char
        )
    }
}

/// Ostrich identity: version plus vendor ID and serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulatorIdentity {
    pub device: DeviceIdentity,
    pub vendor_id: u8,
    pub serial_number: [u8; SERIAL_NUMBER_LEN],
}

/// Issue a `VV` request and collect the three identity bytes.
pub(crate) fn read_version<T: Transport>(port: &mut T) -> Result<DeviceIdentity> {
    port.purge_rx()?;
    port.send(&frame::version_request())?;
    let mut raw = [0u8; 3];
    port.recv_exact(&mut raw)?;
    Ok(DeviceIdentity {
        hardware_version: raw[0],
        firmware_version: raw[1],
        hardware_version_char: raw[2],
    })
}

/// Issue an `NS` request and collect vendor ID and serial number.
///
/// Firmware quirk: when vendor and serial are all zero the device echoes the
/// checksum of the request instead of a checksum of the data; both are
/// accepted.
pub(crate) fn read_serial_number<T: Transport>(
    port: &mut T,
) -> Result<(u8, [u8; SERIAL_NUMBER_LEN])> {
    let request = frame::serial_number_request();
    let command_sum = request[request.len() - 1];

    port.purge_rx()?;
    port.send(&request)?;

    let mut data = [0u8; 1 + SERIAL_NUMBER_LEN];
    port.recv_exact(&mut data)?;
    let mut sum = [0u8; 1];
    port.recv_exact(&mut sum)?;

    let data_sum = frame::checksum(&data);
    if sum[0] != data_sum && sum[0] != command_sum {
        return Err(Error::ChecksumMismatch {
            expected: data_sum,
            found: sum[0],
        });
    }

    let mut serial = [0u8; SERIAL_NUMBER_LEN];
    serial.copy_from_slice(&data[1..]);
    Ok((data[0], serial))
}

/// Run `identify` through the autobaud ladder.
///
/// A byte other than the acknowledgement in reply to the speed bump means
/// nothing compatible is listening and aborts immediately; a silent bump is
/// forgiven once, since the device may already be at the high rate.
pub(crate) fn autobaud<T, R, F>(port: &mut T, mut identify: F) -> Result<R>
where
    T: Transport,
    F: FnMut(&mut T) -> Result<R>,
{
    if !port.is_open() {
        return Err(Error::TransportClosed);
    }

    port.set_framing(HIGH_BAUD)?;
    match identify(port) {
        Ok(id) => return Ok(id),
        Err(e) => debug!("probe at {HIGH_BAUD} baud failed: {e}"),
    }

    port.set_framing(FALLBACK_BAUD)?;
    port.purge_rx()?;
    port.send(&frame::speed_bump())?;
    let mut ack = [0u8; 1];
    match port.recv_exact(&mut ack) {
        Ok(()) if ack[0] == ACK => debug!("device accepted the speed bump"),
        Ok(()) => {
            debug!("speed bump answered with {:#04x}", ack[0]);
            return Err(Error::DeviceNotFound);
        }
        Err(e) if e.is_timeout() => debug!("no speed bump acknowledgement"),
        Err(e) => return Err(e),
    }

    port.set_framing(HIGH_BAUD)?;
    identify(port).map_err(|e| {
        debug!("probe after speed bump failed: {e}");
        Error::DeviceNotFound
    })
}
