// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Chip families the Burn1/2 can talk to.
//!
//! Every family is described by a static capability record; the driver
//! consults the record instead of branching on the chip type in each
//! operation.

use core::fmt;
use core::str::FromStr;

use bitflags::bitflags;

use crate::BANK_COUNT;

bitflags! {
    /// Operations a chip family supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ops: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const ERASE = 1 << 2;
        const BANK_ERASE = 1 << 3;
    }
}

/// Chip families known to the programmer firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipKind {
    /// ATMEL 29C256 EEPROM, 32 KiB. Self-erasing writes.
    At29c256,
    /// Microchip 2732A EPROM, 4 KiB. Read-only from the programmer.
    M2732a,
    /// AMD 29F040 flash, 512 KiB in eight banks.
    Am29f040,
    /// SST 27SF512 flash, 64 KiB. Whole-chip erase only.
    Sst27sf512,
    /// Moates EEC-IV adapter, presented like a banked 512 KiB part.
    EecIv,
}

/// Static capability record for one chip family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chip {
    pub kind: ChipKind,
    /// Name accepted by the command line front-ends.
    pub name: &'static str,
    /// First byte of every programmer command frame.
    pub family: u8,
    /// Chip size in bytes.
    pub size: usize,
    /// Number of 64 KiB banks; 1 for un-banked parts.
    pub banks: usize,
    pub ops: Ops,
}

impl ChipKind {
    /// All families, in the order the front-end documents them.
    pub const ALL: [ChipKind; 5] = [
        ChipKind::Sst27sf512,
        ChipKind::Am29f040,
        ChipKind::EecIv,
        ChipKind::At29c256,
        ChipKind::M2732a,
    ];

    pub const fn record(self) -> Chip {
        match self {
            ChipKind::At29c256 => Chip {
                kind: self,
                name: "AT29C256",
                family: b'2',
                size: 0x8000,
                banks: 1,
                ops: Ops::READ.union(Ops::WRITE),
            },
            ChipKind::M2732a => Chip {
                kind: self,
                name: "M2732A",
                family: b'3',
                size: 0x1000,
                banks: 1,
                ops: Ops::READ,
            },
            ChipKind::Am29f040 => Chip {
                kind: self,
                name: "AM29F040",
                family: b'4',
                size: 0x80000,
                banks: BANK_COUNT,
                ops: Ops::READ
                    .union(Ops::WRITE)
                    .union(Ops::ERASE)
                    .union(Ops::BANK_ERASE),
            },
            ChipKind::Sst27sf512 => Chip {
                kind: self,
                name: "SST27SF512",
                family: b'5',
                size: 0x10000,
                banks: 1,
                ops: Ops::READ.union(Ops::WRITE).union(Ops::ERASE),
            },
            ChipKind::EecIv => Chip {
                kind: self,
                name: "EECIV",
                family: b'J',
                size: 0x80000,
                banks: BANK_COUNT,
                ops: Ops::READ
                    .union(Ops::WRITE)
                    .union(Ops::ERASE)
                    .union(Ops::BANK_ERASE),
            },
        }
    }

    pub fn from_name(name: &str) -> Option<ChipKind> {
        ChipKind::ALL
            .into_iter()
            .find(|kind| kind.record().name.eq_ignore_ascii_case(name))
    }
}

impl Chip {
    /// Whether the address field of a command frame carries a bank byte.
    pub fn banked(&self) -> bool {
        self.banks > 1
    }

    pub fn supports(&self, ops: Ops) -> bool {
        self.ops.contains(ops)
    }
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record().name)
    }
}

impl FromStr for ChipKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChipKind::from_name(s).ok_or_else(|| {
            format!("unknown chip type `{s}` (expected SST27SF512, AM29F040, EECIV, AT29C256 or M2732A)")
        })
    }
}
