// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Driver error type.
//!
//! Propagation is fail-fast: the first non-acknowledgement or checksum
//! failure aborts the running operation, and host-side mirrors (bank state,
//! image buffers) are never updated from a failed exchange.

use moates_proto::ProtoError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport is not open")]
    TransportClosed,

    #[error("transport I/O failed")]
    TransportIo(#[from] std::io::Error),

    #[error("no device answered at either probe rate")]
    DeviceNotFound,

    #[error("device rejected the request with {0:#04x}")]
    DeviceReject(u8),

    #[error("response checksum {found:#04x} does not match computed {expected:#04x}")]
    ChecksumMismatch { expected: u8, found: u8 },

    #[error("operation not supported by this chip")]
    UnsupportedOperation(#[source] ProtoError),

    #[error("size constraint violated")]
    SizeExceeded(#[source] ProtoError),

    #[error("bank roles are out of step with the device")]
    BankIncoherent,

    #[error("malformed trace response")]
    MalformedTrace(#[source] ProtoError),

    #[error("read-back at {addr:#07x} expected {expected:#04x}, found {found:#04x}")]
    VerifyMismatch { addr: u32, expected: u8, found: u8 },

    #[error("no trace log file is open")]
    TraceLogClosed,
}

impl From<ProtoError> for Error {
    fn from(err: ProtoError) -> Self {
        match err {
            ProtoError::Unsupported { .. } => Error::UnsupportedOperation(err),
            ProtoError::MalformedTrace(_) | ProtoError::TraceAddress(_) => {
                Error::MalformedTrace(err)
            }
            ProtoError::SizeExceeded { .. }
            | ProtoError::BlockSize(_)
            | ProtoError::AddressRange { .. }
            | ProtoError::BankSlot(_)
            | ProtoError::TraceConfig(_) => Error::SizeExceeded(err),
        }
    }
}

impl Error {
    /// True when the failure was a transport read that simply timed out,
    /// as opposed to a device answering with something wrong.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TransportIo(e) if e.kind() == std::io::ErrorKind::TimedOut)
    }
}
