// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Address-trace wire format.
//!
//! A trace request carries a flag byte, the packet geometry and a start/end
//! window bracketed by the emulation bank slot. The response is a fixed-size
//! block of MSB-first addresses bracketed by an acknowledgement byte at each
//! end.

use bitflags::bitflags;

use crate::error::ProtoError;
use crate::{ACK, MAX_IMAGE_SIZE};

bitflags! {
    /// Flag byte of a trace request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraceFlags: u8 {
        /// Continuous streaming. Accepted by the firmware but not used by
        /// any of the acquisition paths here.
        const STREAMING = 0x80;
        /// Only report addresses inside the start/end window.
        const WINDOWED = 0x40;
        /// Suppress consecutive hits of the same address.
        const NON_REDUNDANT = 0x20;
        /// Start capturing when the start address is executed.
        const TRIGGER_START = 0x10;
        /// Stop capturing when the end address is executed.
        const TRIGGER_END = 0x08;
        /// Report addresses relative to the window start.
        const RELATIVE = 0x04;
        /// Two-byte addresses.
        const TWO_BYTE = 0x02;
        /// One-byte addresses. Neither width bit set means three bytes.
        const ONE_BYTE = 0x01;
    }
}

/// Geometry and mode of one trace request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceConfig {
    pub windowed: bool,
    pub triggered: bool,
    pub non_redundant: bool,
    pub relative: bool,
    pub streaming: bool,
    /// Bytes per reported address, 1..=3.
    pub address_bytes: u8,
    /// Addresses per packet, 1..=255.
    pub addresses_per_packet: u8,
    /// Packets per trace request, 1..=255.
    pub packets_per_trace: u8,
    /// Window / trigger start address.
    pub start: u16,
    /// Window end or stop trigger; `None` leaves the end trigger disarmed.
    pub end: Option<u16>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            windowed: false,
            triggered: false,
            non_redundant: false,
            relative: false,
            streaming: false,
            address_bytes: 2,
            addresses_per_packet: 255,
            packets_per_trace: 1,
            start: 0,
            end: None,
        }
    }
}

impl TraceConfig {
    pub fn validate(&self) -> Result<(), ProtoError> {
        if !(1..=3).contains(&self.address_bytes) {
            return Err(ProtoError::TraceConfig("address width must be 1..=3 bytes"));
        }
        if self.addresses_per_packet == 0 {
            return Err(ProtoError::TraceConfig("addresses per packet must be nonzero"));
        }
        if self.packets_per_trace == 0 {
            return Err(ProtoError::TraceConfig("packets per trace must be nonzero"));
        }
        if self.windowed && !self.triggered && self.end.is_none() {
            return Err(ProtoError::TraceConfig("windowed trace needs an end address"));
        }
        Ok(())
    }

    /// Assemble the flag byte. Trigger mode forces non-redundant capture and
    /// disables windowing no matter what the caller configured; the end
    /// trigger is armed only when the end address fits the active bank.
    pub fn flags(&self, bank_size: usize) -> TraceFlags {
        let mut flags = TraceFlags::empty();
        if self.triggered {
            flags |= TraceFlags::TRIGGER_START | TraceFlags::NON_REDUNDANT;
            if self.end.is_some_and(|end| (end as usize) < bank_size) {
                flags |= TraceFlags::TRIGGER_END;
            }
        } else {
            if self.windowed {
                flags |= TraceFlags::WINDOWED;
            }
            if self.non_redundant {
                flags |= TraceFlags::NON_REDUNDANT;
            }
        }
        if self.relative {
            flags |= TraceFlags::RELATIVE;
        }
        if self.streaming {
            flags |= TraceFlags::STREAMING;
        }
        match self.address_bytes {
            1 => flags |= TraceFlags::ONE_BYTE,
            2 => flags |= TraceFlags::TWO_BYTE,
            _ => {}
        }
        flags
    }

    /// Total response length, bracketing acknowledgements included.
    pub fn response_len(&self) -> usize {
        self.address_bytes as usize
            * self.addresses_per_packet as usize
            * self.packets_per_trace as usize
            + 2
    }

    /// Build the request frame. `emu_bank` is the emulation bank slot the
    /// window addresses are relative to.
    pub fn request(&self, emu_bank: u8, bank_size: usize) -> Result<Vec<u8>, ProtoError> {
        self.validate()?;
        let end = self.end.unwrap_or(0);
        let mut frame = vec![
            b'T',
            self.flags(bank_size).bits(),
            0x00,
            0x00,
            self.addresses_per_packet,
            self.packets_per_trace,
            emu_bank,
            (self.start >> 8) as u8,
            (self.start & 0xFF) as u8,
            emu_bank,
            (end >> 8) as u8,
            (end & 0xFF) as u8,
        ];
        let sum = crate::frame::checksum(&frame);
        frame.push(sum);
        Ok(frame)
    }

    /// Decode a complete trace response into the addresses it reports.
    pub fn decode(&self, response: &[u8]) -> Result<Vec<u32>, ProtoError> {
        if response.len() != self.response_len() || response.len() < 2 {
            return Err(ProtoError::MalformedTrace("unexpected response length"));
        }
        if response[0] != ACK || response[response.len() - 1] != ACK {
            return Err(ProtoError::MalformedTrace("missing acknowledgement sentinel"));
        }
        let payload = &response[1..response.len() - 1];
        let width = self.address_bytes as usize;
        let mut addresses = Vec::with_capacity(payload.len() / width);
        for record in payload.chunks_exact(width) {
            let addr = record.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
            if addr as usize >= MAX_IMAGE_SIZE {
                return Err(ProtoError::TraceAddress(addr));
            }
            addresses.push(addr);
        }
        Ok(addresses)
    }
}
