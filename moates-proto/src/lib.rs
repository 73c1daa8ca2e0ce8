// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire protocol for the Moates Burn1/2 EPROM programmer and the Ostrich
//! RAM-based EEPROM emulator.
//!
//! This crate is pure data: chip capability records, command frame assembly
//! with the per-command checksum rules, and the trace packet format. It does
//! no I/O. The `moates-driver` crate pairs these frames with a serial
//! transport and the operation state machines.

pub mod chip;
pub mod error;
pub mod frame;
pub mod trace;

pub use chip::{Chip, ChipKind, Ops};
pub use error::ProtoError;
pub use frame::{BankRole, BankSlot};
pub use trace::{TraceConfig, TraceFlags};

/// Acknowledgement byte both device families reply with.
pub const ACK: u8 = b'O';

/// Hardware-version byte reported by a Burn1/2.
pub const BURN_HARDWARE: u8 = 0x05;

/// Hardware-version bytes reported by the two Ostrich revisions.
pub const OSTRICH_HARDWARE: u8 = 0x0A;
pub const OSTRICH_TWO_HARDWARE: u8 = 0x14;

/// Hardware-version character reported by an Ostrich.
pub const OSTRICH_HARDWARE_CH: u8 = b'O';

/// Full Ostrich address space and the largest image either device handles.
pub const MAX_IMAGE_SIZE: usize = 512 * 1024;

/// Number of banks carving the Ostrich (and the banked flash parts).
pub const BANK_COUNT: usize = 8;

/// Size of one numbered bank.
pub const BANK_SIZE: usize = MAX_IMAGE_SIZE / BANK_COUNT;

/// Largest single transfer the programmer hardware accepts.
pub const MAX_BLOCK_SIZE: usize = 256;

/// Granularity of Ostrich bulk transfers.
pub const BULK_BLOCK_SIZE: usize = 256;

/// Largest Ostrich bulk transfer (256 bulk units).
pub const MAX_BULK_BLOCK_SIZE: usize = BULK_BLOCK_SIZE * 256;

/// Length of the Ostrich serial number.
pub const SERIAL_NUMBER_LEN: usize = 8;

/// Preferred operating rate of both device families.
pub const HIGH_BAUD: u32 = 921_600;

/// Power-on rate the devices listen at before the speed bump.
pub const FALLBACK_BAUD: u32 = 115_200;
