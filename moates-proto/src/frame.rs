// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command frame assembly.
//!
//! Every frame ends in a one-byte modular-256 checksum over everything before
//! it. Two inclusion modes exist: data-bearing writes (`W`, `ZW`) carry their
//! payload between the header and the checksum, so the checksum covers
//! header + payload; every other command is header + checksum, with any
//! payload coming back from the device. Checksums are computed locally in
//! each builder; there is no rolling checksum state anywhere in the crate.

use crate::error::ProtoError;
use crate::{Chip, Ops, BANK_SIZE, BULK_BLOCK_SIZE, MAX_BLOCK_SIZE, MAX_BULK_BLOCK_SIZE, MAX_IMAGE_SIZE};

/// Modular-256 checksum both device families use.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Append the checksum over everything assembled so far.
fn sealed(mut frame: Vec<u8>) -> Vec<u8> {
    let sum = checksum(&frame);
    frame.push(sum);
    frame
}

/// Count field for single-byte-count commands; 256 is carried as 0.
fn count_byte(len: usize) -> u8 {
    (len & 0xFF) as u8
}

// --- Shared commands ---

/// `VV` version request. Response is hardware, firmware and
/// hardware-character bytes.
pub fn version_request() -> Vec<u8> {
    sealed(vec![b'V', b'V'])
}

/// `S0` speed bump: ask a device listening at the fallback rate to move to
/// the high rate. Response is a single acknowledgement byte.
pub fn speed_bump() -> Vec<u8> {
    sealed(vec![b'S', 0x00])
}

/// `NS` Ostrich vendor ID and serial number request.
pub fn serial_number_request() -> Vec<u8> {
    sealed(vec![b'N', b'S'])
}

// --- Programmer commands ---

fn chip_block_header(chip: &Chip, dir: u8, addr: usize, len: usize) -> Result<Vec<u8>, ProtoError> {
    if len == 0 || len > MAX_BLOCK_SIZE {
        return Err(ProtoError::BlockSize(len));
    }
    if addr + len > chip.size {
        return Err(ProtoError::AddressRange {
            addr,
            len,
            capacity: chip.size,
        });
    }
    let mut frame = vec![chip.family, dir, count_byte(len)];
    if chip.banked() {
        frame.push((addr / BANK_SIZE) as u8);
    }
    frame.push(((addr >> 8) & 0xFF) as u8);
    frame.push((addr & 0xFF) as u8);
    Ok(frame)
}

/// Read `len` bytes of the chip starting at `addr`. The device answers with
/// the data followed by a checksum over the data alone.
pub fn chip_read(chip: &Chip, addr: usize, len: usize) -> Result<Vec<u8>, ProtoError> {
    chip_block_header(chip, b'R', addr, len).map(sealed)
}

/// Write `data` to the chip starting at `addr`. The payload rides inside the
/// frame and the trailing checksum covers header + payload.
pub fn chip_write(chip: &Chip, addr: usize, data: &[u8]) -> Result<Vec<u8>, ProtoError> {
    let mut frame = chip_block_header(chip, b'W', addr, data.len())?;
    frame.extend_from_slice(data);
    Ok(sealed(frame))
}

/// Erase command. Banked parts erase one bank per command (`bank` required);
/// the SST part takes a single whole-chip erase (`bank` must be `None`).
pub fn chip_erase(chip: &Chip, bank: Option<usize>) -> Result<Vec<u8>, ProtoError> {
    match bank {
        Some(bank) => {
            if !chip.supports(Ops::BANK_ERASE) {
                return Err(ProtoError::Unsupported {
                    chip: chip.name,
                    op: "bank erase",
                });
            }
            if bank >= chip.banks {
                return Err(ProtoError::BankSlot(bank as u8));
            }
            Ok(sealed(vec![chip.family, b'E', bank as u8]))
        }
        None => {
            if !chip.supports(Ops::ERASE) || chip.banked() {
                return Err(ProtoError::Unsupported {
                    chip: chip.name,
                    op: "chip erase",
                });
            }
            Ok(sealed(vec![chip.family, b'E']))
        }
    }
}

// --- Emulator block commands ---

fn emu_block_header(dir: u8, addr: usize, len: usize) -> Result<Vec<u8>, ProtoError> {
    if addr + len > MAX_IMAGE_SIZE {
        return Err(ProtoError::AddressRange {
            addr,
            len,
            capacity: MAX_IMAGE_SIZE,
        });
    }
    if len >= BULK_BLOCK_SIZE {
        // Bulk transfers count in 256-byte units and address in 256-byte
        // units split across two bytes.
        if len % BULK_BLOCK_SIZE != 0 || len > MAX_BULK_BLOCK_SIZE || addr % BULK_BLOCK_SIZE != 0 {
            return Err(ProtoError::BlockSize(len));
        }
        let units = addr / BULK_BLOCK_SIZE;
        Ok(vec![
            b'Z',
            dir,
            count_byte(len / BULK_BLOCK_SIZE),
            ((units >> 8) & 0xFF) as u8,
            (units & 0xFF) as u8,
        ])
    } else if len > 0 {
        Ok(vec![
            dir,
            len as u8,
            ((addr >> 8) & 0xFF) as u8,
            (addr & 0xFF) as u8,
        ])
    } else {
        Err(ProtoError::BlockSize(len))
    }
}

/// Emulator read; picks the bulk (`ZR`) form for 256-multiples.
pub fn emu_read(addr: usize, len: usize) -> Result<Vec<u8>, ProtoError> {
    emu_block_header(b'R', addr, len).map(sealed)
}

/// Emulator write; picks the bulk (`ZW`) form for 256-multiples. Checksum
/// covers header + payload.
pub fn emu_write(addr: usize, data: &[u8]) -> Result<Vec<u8>, ProtoError> {
    let mut frame = emu_block_header(b'W', addr, data.len())?;
    frame.extend_from_slice(data);
    Ok(sealed(frame))
}

// --- Emulator bank commands ---

/// One of the three independent bank pointers the emulator maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankRole {
    /// The bank the ECU executes out of.
    Emulation,
    /// The bank restored after a power cycle.
    Persistent,
    /// The bank host reads and writes touch.
    Update,
}

impl BankRole {
    pub const ALL: [BankRole; 3] = [BankRole::Emulation, BankRole::Persistent, BankRole::Update];

    /// Letter carried in bank set/get frames.
    pub fn wire(self) -> u8 {
        match self {
            BankRole::Emulation => b'E',
            BankRole::Persistent => b'S',
            BankRole::Update => b'R',
        }
    }
}

/// A bank selection: one of the eight 64 KiB slots, or the whole 512 KiB
/// space presented contiguously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankSlot {
    Bank(u8),
    Whole,
}

impl BankSlot {
    pub fn wire(self) -> u8 {
        match self {
            BankSlot::Bank(n) => n,
            BankSlot::Whole => 8,
        }
    }

    pub fn from_wire(byte: u8) -> Option<BankSlot> {
        match byte {
            0..=7 => Some(BankSlot::Bank(byte)),
            8 => Some(BankSlot::Whole),
            _ => None,
        }
    }

    pub fn is_whole(self) -> bool {
        matches!(self, BankSlot::Whole)
    }

    /// Size of the address window this selection presents.
    pub fn size(self) -> usize {
        match self {
            BankSlot::Bank(_) => BANK_SIZE,
            BankSlot::Whole => MAX_IMAGE_SIZE,
        }
    }
}

impl std::fmt::Display for BankSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankSlot::Bank(n) => write!(f, "bank {n}"),
            BankSlot::Whole => f.write_str("whole device"),
        }
    }
}

/// `BS` bank set: point `role` at `slot`. Response is a single
/// acknowledgement byte.
pub fn bank_set(role: BankRole, slot: BankSlot) -> Result<Vec<u8>, ProtoError> {
    let wire = slot.wire();
    if wire > 8 {
        return Err(ProtoError::BankSlot(wire));
    }
    Ok(sealed(vec![b'B', b'S', role.wire(), wire]))
}

/// `BG` bank get: query where `role` points. Response is a single slot byte.
pub fn bank_get(role: BankRole) -> Vec<u8> {
    sealed(vec![b'B', b'G', role.wire()])
}
