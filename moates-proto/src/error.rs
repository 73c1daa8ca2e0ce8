// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Protocol-level error type.

use thiserror::Error;

/// Failures that can be detected without talking to a device: a frame that
/// cannot be assembled, or a response that cannot be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    #[error("image of {image} bytes does not fit in {capacity} bytes")]
    SizeExceeded { image: usize, capacity: usize },

    #[error("block size {0} is outside the legal range")]
    BlockSize(usize),

    #[error("address range {addr:#x}..{addr:#x}+{len} exceeds {capacity:#x}")]
    AddressRange {
        addr: usize,
        len: usize,
        capacity: usize,
    },

    #[error("bank slot {0} is outside 0..=8")]
    BankSlot(u8),

    #[error("{chip} does not support {op}")]
    Unsupported {
        chip: &'static str,
        op: &'static str,
    },

    #[error("invalid trace configuration: {0}")]
    TraceConfig(&'static str),

    #[error("malformed trace response: {0}")]
    MalformedTrace(&'static str),

    #[error("trace address {0:#07x} is outside the address space")]
    TraceAddress(u32),
}
