// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Burn1/2 programmer engine.
//!
//! Chip-family-aware erase / blank-verify / write / read-back pipeline. A
//! shorter-than-chip image is placed flush against the top of the chip; the
//! offset arithmetic lives in [`crate::compute_offset`].

use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::compute_offset;
use crate::error::{Error, Result};
use crate::probe::{self, DeviceIdentity};
use crate::transport::Transport;
use moates_proto::{frame, Chip, ChipKind, Ops, ProtoError, ACK, BURN_HARDWARE, MAX_BLOCK_SIZE};

/// How long the chip needs to settle after an erase before the device
/// acknowledges. The documentation says half a second; waiting a full second
/// keeps slow parts honest.
pub const ERASE_SETTLE: Duration = Duration::from_secs(1);

/// Progress callback: bytes done, bytes total.
pub type Progress = Box<dyn FnMut(u64, u64) + Send>;

/// Probe the port for a Burn1/2 without committing to a chip family.
pub fn probe_device<T: Transport>(port: &mut T) -> Result<DeviceIdentity> {
    probe::autobaud(port, |port| {
        let id = probe::read_version(port)?;
        if id.hardware_version != BURN_HARDWARE {
            debug!("hardware byte {:#04x} is not a Burn1/2", id.hardware_version);
            return Err(Error::DeviceNotFound);
        }
        Ok(id)
    })
}

/// One programmer attached to one serial port, configured for one chip
/// family.
pub struct Programmer<T> {
    port: T,
    chip: Chip,
    identity: Option<DeviceIdentity>,
    block_size: usize,
    erase_settle: Duration,
    image: Vec<u8>,
    progress: Option<Progress>,
}

impl<T: Transport> Programmer<T> {
    pub fn new(port: T, kind: ChipKind) -> Self {
        let chip = kind.record();
        Programmer {
            port,
            chip,
            identity: None,
            block_size: MAX_BLOCK_SIZE,
            erase_settle: ERASE_SETTLE,
            image: vec![0; chip.size],
            progress: None,
        }
    }

    pub fn chip(&self) -> &Chip {
        &self.chip
    }

    /// The owned transport. Dropping the programmer closes it.
    pub fn transport(&self) -> &T {
        &self.port
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.port
    }

    /// Identity from the last successful probe.
    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    /// Transfer size for reads and writes, 1..=256.
    pub fn set_block_size(&mut self, size: usize) -> Result<()> {
        if size == 0 || size > MAX_BLOCK_SIZE {
            return Err(Error::SizeExceeded(ProtoError::BlockSize(size)));
        }
        self.block_size = size;
        Ok(())
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Override the post-erase settling delay (fast parts, test rigs).
    pub fn set_erase_settle(&mut self, settle: Duration) {
        self.erase_settle = settle;
    }

    /// Report per-block progress to `callback` during reads and writes.
    pub fn set_progress(&mut self, callback: Progress) {
        self.progress = Some(callback);
    }

    /// Probe for the device, renegotiating the line rate if needed.
    pub fn probe(&mut self) -> Result<DeviceIdentity> {
        self.identity = None;
        let id = probe_device(&mut self.port)?;
        info!("found Burn1/2, version {id}");
        self.identity = Some(id);
        Ok(id)
    }

    /// Erase the whole chip: bank by bank on the banked parts, one command
    /// on the SST part.
    pub fn erase_chip(&mut self) -> Result<()> {
        self.ensure(Ops::ERASE, "erase")?;
        if self.chip.banked() {
            for bank in 0..self.chip.banks {
                self.erase_bank(bank)?;
            }
            Ok(())
        } else {
            info!("erasing {}", self.chip.name);
            let request = frame::chip_erase(&self.chip, None)?;
            self.port.purge_rx()?;
            self.port.send(&request)?;
            thread::sleep(self.erase_settle);
            self.await_ack()
        }
    }

    /// Erase a single 64 KiB bank of a banked part.
    pub fn erase_bank(&mut self, bank: usize) -> Result<()> {
        self.ensure(Ops::BANK_ERASE, "bank erase")?;
        info!("erasing {} bank {bank}", self.chip.name);
        let request = frame::chip_erase(&self.chip, Some(bank))?;
        self.port.purge_rx()?;
        self.port.send(&request)?;
        thread::sleep(self.erase_settle);
        self.await_ack()
    }

    /// Read the whole chip into the instance buffer and return it.
    pub fn read_chip(&mut self) -> Result<&[u8]> {
        self.ensure(Ops::READ, "read")?;
        let size = self.chip.size;
        let mut block = [0u8; MAX_BLOCK_SIZE + 1];
        let mut addr = 0;
        while addr < size {
            let len = self.block_size.min(size - addr);
            let request = frame::chip_read(&self.chip, addr, len)?;
            self.port.purge_rx()?;
            self.port.send(&request)?;

            let reply = &mut block[..len + 1];
            self.port.recv_exact(reply)?;
            let expected = frame::checksum(&reply[..len]);
            if reply[len] != expected {
                return Err(Error::ChecksumMismatch {
                    expected,
                    found: reply[len],
                });
            }

            // Committed only after the checksum holds.
            self.image[addr..addr + len].copy_from_slice(&reply[..len]);
            addr += len;
            self.report(addr as u64, size as u64);
        }
        debug!("read {size} bytes from {}", self.chip.name);
        Ok(&self.image)
    }

    /// True when every byte of the chip reads back as `0xFF`.
    pub fn verify_blank(&mut self) -> Result<bool> {
        Ok(self.read_chip()?.iter().all(|&b| b == 0xFF))
    }

    /// Write `image` to the chip, flush to the top. The chip is assumed to
    /// be blank; writes are never retried, since a partial write leaves the
    /// chip indeterminate.
    pub fn write_image(&mut self, image: &[u8]) -> Result<()> {
        self.ensure(Ops::WRITE, "write")?;
        let size = self.chip.size;
        let offset = compute_offset(image.len(), size)?;
        debug!("writing {} bytes at offset {offset:#x}", image.len());
        let mut addr = offset;
        while addr < size {
            let len = self.block_size.min(size - addr);
            let data = &image[addr - offset..addr - offset + len];
            let request = frame::chip_write(&self.chip, addr, data)?;
            self.port.purge_rx()?;
            self.port.send(&request)?;
            self.await_ack()?;
            addr += len;
            self.report((addr - offset) as u64, image.len() as u64);
        }
        Ok(())
    }

    /// Read the chip back and compare its top `image.len()` bytes with
    /// `image`.
    pub fn verify_image(&mut self, image: &[u8]) -> Result<()> {
        let offset = compute_offset(image.len(), self.chip.size)?;
        self.read_chip()?;
        for (i, &expected) in image.iter().enumerate() {
            let found = self.image[offset + i];
            if found != expected {
                return Err(Error::VerifyMismatch {
                    addr: (offset + i) as u32,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// The full programming sequence: probe, erase, blank-verify, write,
    /// read-back verify. Chips without an erase (the self-erasing EEPROM)
    /// skip straight to the write. The first failing step aborts the rest.
    pub fn program(&mut self, image: &[u8]) -> Result<()> {
        self.ensure(Ops::WRITE, "write")?;
        compute_offset(image.len(), self.chip.size)?;
        self.probe()?;
        if self.chip.supports(Ops::ERASE) {
            self.erase_chip()?;
            let chip = self.read_chip()?;
            if let Some(i) = chip.iter().position(|&b| b != 0xFF) {
                let found = chip[i];
                return Err(Error::VerifyMismatch {
                    addr: i as u32,
                    expected: 0xFF,
                    found,
                });
            }
        }
        self.write_image(image)?;
        self.verify_image(image)
    }

    fn ensure(&self, ops: Ops, name: &'static str) -> Result<()> {
        if !self.port.is_open() {
            return Err(Error::TransportClosed);
        }
        if self.chip.supports(ops) {
            Ok(())
        } else {
            Err(Error::UnsupportedOperation(ProtoError::Unsupported {
                chip: self.chip.name,
                op: name,
            }))
        }
    }

    fn await_ack(&mut self) -> Result<()> {
        let mut reply = [0u8; 1];
        self.port.recv_exact(&mut reply)?;
        if reply[0] == ACK {
            Ok(())
        } else {
            Err(Error::DeviceReject(reply[0]))
        }
    }

    fn report(&mut self, done: u64, total: u64) {
        if let Some(cb) = self.progress.as_mut() {
            cb(done, total);
        }
    }
}
