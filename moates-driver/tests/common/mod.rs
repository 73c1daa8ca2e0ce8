// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Test transports: a scripted byte-queue transport for exact wire
//! assertions, plus in-memory Burn and Ostrich simulators for round-trip
//! scenarios.

// Each test binary uses its own slice of this module.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use moates_driver::{Error, Result, Transport};
use moates_proto::frame::checksum;
use moates_proto::{
    Chip, ChipKind, ACK, BANK_SIZE, BURN_HARDWARE, FALLBACK_BAUD, HIGH_BAUD, MAX_IMAGE_SIZE,
    OSTRICH_HARDWARE, SERIAL_NUMBER_LEN,
};

fn timed_out() -> Error {
    Error::TransportIo(io::Error::new(io::ErrorKind::TimedOut, "no response"))
}

/// Replays canned response bytes and records everything the host sends.
pub struct ScriptedTransport {
    pub open: bool,
    pub rx: VecDeque<u8>,
    pub sent: Vec<u8>,
    pub bauds: Vec<u32>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        ScriptedTransport {
            open: true,
            rx: VecDeque::new(),
            sent: Vec::new(),
            bauds: Vec::new(),
        }
    }

    pub fn respond(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }
}

impl Transport for ScriptedTransport {
    fn is_open(&self) -> bool {
        self.open
    }

    fn set_framing(&mut self, baud: u32) -> Result<()> {
        self.bauds.push(baud);
        Ok(())
    }

    fn set_read_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::TransportClosed);
        }
        self.sent.extend_from_slice(bytes);
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.rx.pop_front().ok_or_else(timed_out)?;
        }
        Ok(())
    }

    fn purge_rx(&mut self) -> Result<()> {
        // Scripted responses model bytes the device has not sent yet, so a
        // purge must not eat them.
        Ok(())
    }

    fn purge_tx(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory Burn1/2: parses the frames the driver sends and emulates the
/// chip behind it.
pub struct FakeBurn {
    pub chip: Chip,
    pub memory: Vec<u8>,
    pub rx: VecDeque<u8>,
    /// Rate the host configured on the transport.
    pub baud: u32,
    /// Rate the device is listening at; frames sent at any other rate are
    /// silently lost.
    pub device_baud: u32,
    pub firmware: u8,
    /// Every complete frame the device understood, in order.
    pub frames: Vec<Vec<u8>>,
    /// (address, length) of every write accepted.
    pub writes: Vec<(usize, usize)>,
    /// Bank number of every erase accepted; `None` for a whole-chip erase.
    pub erases: Vec<Option<usize>>,
    /// Corrupt the checksum byte of the next read response.
    pub corrupt_next_read: bool,
    /// Answer writes with `?` instead of the acknowledgement.
    pub reject_writes: bool,
}

impl FakeBurn {
    pub fn new(kind: ChipKind) -> Self {
        let chip = kind.record();
        FakeBurn {
            chip,
            memory: vec![0xFF; chip.size],
            rx: VecDeque::new(),
            baud: HIGH_BAUD,
            device_baud: HIGH_BAUD,
            firmware: 0x21,
            frames: Vec::new(),
            writes: Vec::new(),
            erases: Vec::new(),
            corrupt_next_read: false,
            reject_writes: false,
        }
    }

    /// A device still waiting at its power-on rate.
    pub fn asleep(kind: ChipKind) -> Self {
        let mut fake = Self::new(kind);
        fake.device_baud = FALLBACK_BAUD;
        fake
    }

    fn handle(&mut self, bytes: &[u8]) {
        if self.baud != self.device_baud {
            return;
        }
        self.frames.push(bytes.to_vec());

        match bytes {
            [b'V', b'V', _] => {
                self.rx.extend([BURN_HARDWARE, self.firmware, ACK]);
            }
            [b'S', 0x00, _] => {
                self.device_baud = HIGH_BAUD;
                self.rx.push_back(ACK);
            }
            _ if bytes.first() == Some(&self.chip.family) => self.handle_chip_frame(bytes),
            _ => panic!("unexpected frame {bytes:02X?}"),
        }
    }

    fn handle_chip_frame(&mut self, bytes: &[u8]) {
        let banked = self.chip.banked();
        match bytes[1] {
            b'R' => {
                let header = if banked { 6 } else { 5 };
                assert_eq!(bytes.len(), header + 1, "read frame {bytes:02X?}");
                assert_eq!(bytes[header], checksum(&bytes[..header]));
                let (addr, len) = self.decode_addr(bytes);
                let data = self.memory[addr..addr + len].to_vec();
                let mut sum = checksum(&data);
                if std::mem::take(&mut self.corrupt_next_read) {
                    sum ^= 0xFF;
                }
                self.rx.extend(data);
                self.rx.push_back(sum);
            }
            b'W' => {
                let header = if banked { 6 } else { 5 };
                let (addr, len) = self.decode_addr(bytes);
                assert_eq!(bytes.len(), header + len + 1, "write frame at {addr:#x}");
                assert_eq!(bytes[header + len], checksum(&bytes[..header + len]));
                if self.reject_writes {
                    self.rx.push_back(b'?');
                    return;
                }
                self.memory[addr..addr + len].copy_from_slice(&bytes[header..header + len]);
                self.writes.push((addr, len));
                self.rx.push_back(ACK);
            }
            b'E' => {
                if banked {
                    assert_eq!(bytes.len(), 4);
                    assert_eq!(bytes[3], checksum(&bytes[..3]));
                    let bank = bytes[2] as usize;
                    self.memory[bank * BANK_SIZE..(bank + 1) * BANK_SIZE].fill(0xFF);
                    self.erases.push(Some(bank));
                } else {
                    assert_eq!(bytes.len(), 3);
                    assert_eq!(bytes[2], checksum(&bytes[..2]));
                    self.memory.fill(0xFF);
                    self.erases.push(None);
                }
                self.rx.push_back(ACK);
            }
            other => panic!("unexpected chip command {other:#04x}"),
        }
    }

    /// (address, length) from a read/write header; count 0 means 256.
    fn decode_addr(&self, bytes: &[u8]) -> (usize, usize) {
        let len = if bytes[2] == 0 { 256 } else { bytes[2] as usize };
        let addr = if self.chip.banked() {
            ((bytes[3] as usize) << 16) | ((bytes[4] as usize) << 8) | bytes[5] as usize
        } else {
            ((bytes[3] as usize) << 8) | bytes[4] as usize
        };
        (addr, len)
    }
}

impl Transport for FakeBurn {
    fn is_open(&self) -> bool {
        true
    }

    fn set_framing(&mut self, baud: u32) -> Result<()> {
        self.baud = baud;
        Ok(())
    }

    fn set_read_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.handle(bytes);
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.rx.pop_front().ok_or_else(timed_out)?;
        }
        Ok(())
    }

    fn purge_rx(&mut self) -> Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn purge_tx(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory Ostrich with 512 KiB of emulation RAM and the three bank
/// pointers.
pub struct FakeOstrich {
    pub memory: Vec<u8>,
    /// Device-side slots: emulation, persistent, update.
    pub emulation: u8,
    pub persistent: u8,
    pub update: u8,
    pub rx: VecDeque<u8>,
    pub baud: u32,
    pub device_baud: u32,
    pub vendor: u8,
    pub serial: [u8; SERIAL_NUMBER_LEN],
    /// Addresses reported by the next trace request, cycled to fill the
    /// requested geometry.
    pub trace_addresses: Vec<u32>,
    pub trace_requests: Vec<Vec<u8>>,
    pub frames: Vec<Vec<u8>>,
    pub writes: Vec<(usize, usize)>,
    /// Acknowledge only this many of the three bank-set commands of a
    /// force-all sequence (3 = all).
    pub bank_acks: usize,
    /// Always answer the serial-number request with a bogus checksum.
    pub bad_serial_sum: bool,
}

impl FakeOstrich {
    pub fn new() -> Self {
        FakeOstrich {
            memory: vec![0xFF; MAX_IMAGE_SIZE],
            emulation: 0,
            persistent: 0,
            update: 0,
            rx: VecDeque::new(),
            baud: HIGH_BAUD,
            device_baud: HIGH_BAUD,
            vendor: 0x4D,
            serial: [0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37],
            trace_addresses: Vec::new(),
            trace_requests: Vec::new(),
            frames: Vec::new(),
            writes: Vec::new(),
            bank_acks: 3,
            bad_serial_sum: false,
        }
    }

    /// Base address of the window the update bank presents.
    fn update_base(&self) -> usize {
        if self.update >= 8 {
            0
        } else {
            self.update as usize * BANK_SIZE
        }
    }

    fn role_slot(&mut self, letter: u8) -> &mut u8 {
        match letter {
            b'E' => &mut self.emulation,
            b'S' => &mut self.persistent,
            b'R' => &mut self.update,
            other => panic!("unknown role letter {other:#04x}"),
        }
    }

    fn handle(&mut self, bytes: &[u8]) {
        if self.baud != self.device_baud {
            return;
        }
        self.frames.push(bytes.to_vec());

        match bytes {
            [b'V', b'V', _] => {
                self.rx.extend([OSTRICH_HARDWARE, 0x12, ACK]);
            }
            [b'S', 0x00, _] => {
                self.device_baud = HIGH_BAUD;
                self.rx.push_back(ACK);
            }
            [b'N', b'S', command_sum] => {
                let command_sum = *command_sum;
                self.rx.push_back(self.vendor);
                self.rx.extend(self.serial);
                let mut data = vec![self.vendor];
                data.extend(self.serial);
                let all_zero = data.iter().all(|&b| b == 0);
                let sum = if self.bad_serial_sum {
                    checksum(&data) ^ 0x55
                } else if all_zero {
                    // Firmware quirk: all-zero identity echoes the request
                    // checksum.
                    command_sum
                } else {
                    checksum(&data)
                };
                self.rx.push_back(sum);
            }
            [b'B', b'S', letter, slot, sum] => {
                assert_eq!(*sum, checksum(&bytes[..4]));
                assert!(*slot <= 8, "bank slot {slot}");
                if self.bank_acks == 0 {
                    return;
                }
                self.bank_acks -= 1;
                *self.role_slot(*letter) = *slot;
                self.rx.push_back(ACK);
            }
            [b'B', b'G', letter, sum] => {
                assert_eq!(*sum, checksum(&bytes[..3]));
                let slot = *self.role_slot(*letter);
                self.rx.push_back(slot);
            }
            [b'T', ..] => self.handle_trace(bytes),
            [b'Z', dir, ..] => self.handle_bulk(*dir, bytes),
            [b'R', ..] | [b'W', ..] => self.handle_byte_mode(bytes),
            _ => panic!("unexpected frame {bytes:02X?}"),
        }
    }

    fn handle_byte_mode(&mut self, bytes: &[u8]) {
        let len = if bytes[1] == 0 { 256 } else { bytes[1] as usize };
        let addr = self.update_base() + (((bytes[2] as usize) << 8) | bytes[3] as usize);
        match bytes[0] {
            b'R' => {
                assert_eq!(bytes.len(), 5);
                assert_eq!(bytes[4], checksum(&bytes[..4]));
                let data = self.memory[addr..addr + len].to_vec();
                let sum = checksum(&data);
                self.rx.extend(data);
                self.rx.push_back(sum);
            }
            b'W' => {
                assert_eq!(bytes.len(), 4 + len + 1);
                assert_eq!(bytes[4 + len], checksum(&bytes[..4 + len]));
                self.memory[addr..addr + len].copy_from_slice(&bytes[4..4 + len]);
                self.writes.push((addr, len));
                self.rx.push_back(ACK);
            }
            _ => unreachable!(),
        }
    }

    fn handle_bulk(&mut self, dir: u8, bytes: &[u8]) {
        let units = if bytes[2] == 0 { 256 } else { bytes[2] as usize };
        let len = units * 256;
        let addr = self.update_base() + (((bytes[3] as usize) << 8) | bytes[4] as usize) * 256;
        match dir {
            b'R' => {
                assert_eq!(bytes.len(), 6);
                assert_eq!(bytes[5], checksum(&bytes[..5]));
                let data = self.memory[addr..addr + len].to_vec();
                let sum = checksum(&data);
                self.rx.extend(data);
                self.rx.push_back(sum);
            }
            b'W' => {
                assert_eq!(bytes.len(), 5 + len + 1);
                assert_eq!(bytes[5 + len], checksum(&bytes[..5 + len]));
                self.memory[addr..addr + len].copy_from_slice(&bytes[5..5 + len]);
                self.writes.push((addr, len));
                self.rx.push_back(ACK);
            }
            _ => unreachable!(),
        }
    }

    fn handle_trace(&mut self, bytes: &[u8]) {
        assert_eq!(bytes.len(), 13, "trace frame {bytes:02X?}");
        assert_eq!(bytes[12], checksum(&bytes[..12]));
        self.trace_requests.push(bytes.to_vec());

        let flags = bytes[1];
        let width = match flags & 0x03 {
            0x01 => 1usize,
            0x02 => 2,
            _ => 3,
        };
        let count = bytes[4] as usize * bytes[5] as usize;
        assert!(
            !self.trace_addresses.is_empty(),
            "trace requested but no addresses staged"
        );

        self.rx.push_back(ACK);
        for i in 0..count {
            let addr = self.trace_addresses[i % self.trace_addresses.len()];
            for shift in (0..width).rev() {
                self.rx.push_back((addr >> (8 * shift)) as u8);
            }
        }
        self.rx.push_back(ACK);
    }
}

impl Transport for FakeOstrich {
    fn is_open(&self) -> bool {
        true
    }

    fn set_framing(&mut self, baud: u32) -> Result<()> {
        self.baud = baud;
        Ok(())
    }

    fn set_read_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.handle(bytes);
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.rx.pop_front().ok_or_else(timed_out)?;
        }
        Ok(())
    }

    fn purge_rx(&mut self) -> Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn purge_tx(&mut self) -> Result<()> {
        Ok(())
    }
}
