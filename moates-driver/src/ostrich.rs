// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Ostrich emulator engine.
//!
//! Mirrors the three bank roles on the host, keeps them coherent across
//! whole-device transitions, moves blocks with the byte or bulk framing as
//! the transfer size dictates, and acquires address traces into a buffer,
//! the hit map and an optional log file.

use std::path::Path;

use log::{debug, info, warn};

use crate::capture::{HitMap, TraceLog};
use crate::compute_offset;
use crate::error::{Error, Result};
use crate::probe::{self, DeviceIdentity, EmulatorIdentity};
use crate::transport::Transport;
use moates_proto::{
    frame, BankRole, BankSlot, ProtoError, TraceConfig, ACK, BULK_BLOCK_SIZE, MAX_BULK_BLOCK_SIZE,
    MAX_IMAGE_SIZE, OSTRICH_HARDWARE, OSTRICH_HARDWARE_CH, OSTRICH_TWO_HARDWARE,
};

/// Default transfer size: 64 bulk units. Larger sizes are legal but lean on
/// the OS serial buffering; 16 KiB reads back reliably everywhere.
pub const DEFAULT_BLOCK_SIZE: usize = BULK_BLOCK_SIZE * 64;

/// Largest possible trace response.
const TRACE_BUF_SIZE: usize = 3 * 255 * 255 + 2;

/// Probe the port for an Ostrich without constructing an engine.
pub fn probe_device<T: Transport>(port: &mut T) -> Result<EmulatorIdentity> {
    probe::autobaud(port, |port| {
        let device = probe::read_version(port)?;
        let known = device.hardware_version == OSTRICH_HARDWARE
            || device.hardware_version == OSTRICH_TWO_HARDWARE;
        if !known || device.hardware_version_char != OSTRICH_HARDWARE_CH {
            debug!(
                "hardware bytes {:#04x}/{:?} are not an Ostrich",
                device.hardware_version, device.hardware_version_char as char
            );
            return Err(Error::DeviceNotFound);
        }
        let (vendor_id, serial_number) = probe::read_serial_number(port)?;
        Ok(EmulatorIdentity {
            device,
            vendor_id,
            serial_number,
        })
    })
}

/// One emulator attached to one serial port.
pub struct Emulator<T> {
    port: T,
    identity: Option<EmulatorIdentity>,
    /// Host mirror of the three roles, indexed by `BankRole`; `None` until
    /// the device has been asked.
    banks: [Option<BankSlot>; 3],
    /// Cleared when a whole-boundary transition fails partway; block I/O is
    /// refused until `get_bank` reconciles.
    coherent: bool,
    block_size: usize,
    trace: TraceConfig,
    hit_map: HitMap,
    trace_log: Option<TraceLog>,
    image: Vec<u8>,
    scratch: Vec<u8>,
    trace_buf: Vec<u8>,
    progress: Option<crate::burn::Progress>,
}

impl<T: Transport> Emulator<T> {
    pub fn new(port: T) -> Self {
        Emulator {
            port,
            identity: None,
            banks: [None; 3],
            coherent: true,
            block_size: DEFAULT_BLOCK_SIZE,
            trace: TraceConfig::default(),
            hit_map: HitMap::new(),
            trace_log: None,
            image: vec![0; MAX_IMAGE_SIZE],
            scratch: vec![0; MAX_BULK_BLOCK_SIZE + 1],
            trace_buf: vec![0; TRACE_BUF_SIZE],
            progress: None,
        }
    }

    pub fn identity(&self) -> Option<&EmulatorIdentity> {
        self.identity.as_ref()
    }

    /// The owned transport. Dropping the emulator closes it.
    pub fn transport(&self) -> &T {
        &self.port
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.port
    }

    /// Report per-block progress to `callback` during reads and writes.
    pub fn set_progress(&mut self, callback: crate::burn::Progress) {
        self.progress = Some(callback);
    }

    /// Probe for the device, renegotiating the line rate if needed, and
    /// fetch vendor ID and serial number.
    pub fn probe(&mut self) -> Result<EmulatorIdentity> {
        self.identity = None;
        let id = probe_device(&mut self.port)?;
        info!("found Ostrich, version {}", id.device);
        self.identity = Some(id);
        Ok(id)
    }

    pub fn device_version(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref().map(|id| &id.device)
    }

    // --- Block sizing ---

    /// Set the transfer size: 1..=256 byte-mode, or a multiple of 256 up to
    /// 64 KiB bulk-mode. A bulk size that is not a multiple of 256 is
    /// rounded down with a warning. Returns the size actually in effect.
    pub fn set_block_size(&mut self, want: usize) -> Result<usize> {
        if want == 0 || want > MAX_BULK_BLOCK_SIZE {
            return Err(Error::SizeExceeded(ProtoError::BlockSize(want)));
        }
        if want > BULK_BLOCK_SIZE && want % BULK_BLOCK_SIZE != 0 {
            let rounded = want - want % BULK_BLOCK_SIZE;
            warn!("block size {want} is not bulk-aligned; using {rounded}");
            self.block_size = rounded;
        } else {
            self.block_size = want;
        }
        Ok(self.block_size)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Size of the next transfer given how much is left.
    ///
    /// A residual that is not bulk-aligned gets a short byte-mode transfer
    /// first, so everything after it is aligned; otherwise the configured
    /// block size rules, shrinking at the tail.
    fn next_transfer(&self, residual: usize) -> usize {
        let step = if residual >= BULK_BLOCK_SIZE && residual % BULK_BLOCK_SIZE != 0 {
            residual % BULK_BLOCK_SIZE
        } else if residual >= self.block_size {
            self.block_size
        } else if residual > BULK_BLOCK_SIZE {
            residual - residual % BULK_BLOCK_SIZE
        } else {
            residual
        };
        step.min(self.block_size)
    }

    // --- Bank model ---

    /// Where the host believes `role` points, if it has been established.
    pub fn mirrored_bank(&self, role: BankRole) -> Option<BankSlot> {
        self.banks[role_index(role)]
    }

    /// Point `role` at `slot`.
    ///
    /// A transition crossing the whole-device boundary in either direction
    /// forces all three roles to `slot` in one three-command sequence;
    /// anything less than three acknowledgements back latches the incoherent
    /// state.
    pub fn set_bank(&mut self, slot: BankSlot, role: BankRole) -> Result<()> {
        self.ensure_open()?;
        let crossing = if slot.is_whole() {
            self.banks.iter().any(|b| *b != Some(BankSlot::Whole))
        } else {
            self.banks.iter().any(|b| *b == Some(BankSlot::Whole))
        };
        if !self.coherent || crossing {
            return self.force_all_banks(slot);
        }

        self.port.purge_tx()?;
        self.port.purge_rx()?;
        self.port.send(&frame::bank_set(role, slot)?)?;
        self.await_ack()?;
        self.banks[role_index(role)] = Some(slot);
        debug!("{role:?} -> {slot}");
        Ok(())
    }

    /// Ask the device where `role` points. The first query adopts the
    /// device's answer; later disagreements are reconciled by setting the
    /// device value back, which re-establishes coherence.
    pub fn get_bank(&mut self, role: BankRole) -> Result<BankSlot> {
        self.ensure_open()?;
        self.port.purge_tx()?;
        self.port.purge_rx()?;
        self.port.send(&frame::bank_get(role))?;
        let mut reply = [0u8; 1];
        self.port.recv_exact(&mut reply)?;
        let slot = BankSlot::from_wire(reply[0]).ok_or(Error::DeviceReject(reply[0]))?;

        match self.banks[role_index(role)] {
            Some(mirrored) if mirrored == slot => Ok(slot),
            None => {
                self.banks[role_index(role)] = Some(slot);
                self.recheck_coherence();
                debug!("adopted {role:?} = {slot}");
                Ok(slot)
            }
            Some(mirrored) => {
                warn!("device reports {role:?} = {slot}, mirror had {mirrored}; reconciling");
                self.set_bank(slot, role)?;
                Ok(slot)
            }
        }
    }

    /// Capacity of the window the update bank currently presents.
    pub fn update_bank_size(&mut self) -> Result<usize> {
        match self.banks[role_index(BankRole::Update)] {
            Some(slot) => Ok(slot.size()),
            None => Ok(self.get_bank(BankRole::Update)?.size()),
        }
    }

    fn force_all_banks(&mut self, slot: BankSlot) -> Result<()> {
        info!("forcing all bank roles to {slot}");
        self.port.purge_tx()?;
        self.port.purge_rx()?;
        for role in BankRole::ALL {
            self.port.send(&frame::bank_set(role, slot)?)?;
        }
        let mut acks = [0u8; 3];
        let complete =
            self.port.recv_exact(&mut acks).is_ok() && acks.iter().all(|&a| a == ACK);
        if !complete {
            self.coherent = false;
            return Err(Error::BankIncoherent);
        }
        self.banks = [Some(slot); 3];
        self.coherent = true;
        Ok(())
    }

    fn recheck_coherence(&mut self) {
        if self.coherent {
            return;
        }
        // Known roles must not mix whole-device with numbered banks.
        let known: Vec<BankSlot> = self.banks.iter().flatten().copied().collect();
        if known.len() == self.banks.len() {
            let whole = known.iter().filter(|s| s.is_whole()).count();
            self.coherent = whole == 0 || whole == known.len();
        }
    }

    // --- Block I/O ---

    /// Read the update bank into the instance buffer and return it.
    pub fn read_bank(&mut self) -> Result<&[u8]> {
        self.ensure_coherent()?;
        let size = self.update_bank_size()?;
        let mut addr = 0;
        while addr < size {
            let len = self.next_transfer(size - addr);
            let request = frame::emu_read(addr, len)?;
            self.port.purge_rx()?;
            self.port.send(&request)?;

            let reply = &mut self.scratch[..len + 1];
            self.port.recv_exact(reply)?;
            let expected = frame::checksum(&reply[..len]);
            if reply[len] != expected {
                return Err(Error::ChecksumMismatch {
                    expected,
                    found: reply[len],
                });
            }

            self.image[addr..addr + len].copy_from_slice(&reply[..len]);
            addr += len;
            self.report(addr as u64, size as u64);
        }
        debug!("read {size} bytes from the update bank");
        Ok(&self.image[..size])
    }

    /// Write `image` into the update bank, flush to the top of the bank.
    pub fn write_image(&mut self, image: &[u8]) -> Result<()> {
        self.ensure_coherent()?;
        let size = self.update_bank_size()?;
        let offset = compute_offset(image.len(), size)?;
        debug!("writing {} bytes at offset {offset:#x}", image.len());
        let mut addr = offset;
        while addr < size {
            let len = self.next_transfer(size - addr);
            let data = &image[addr - offset..addr - offset + len];
            let request = frame::emu_write(addr, data)?;
            self.port.purge_rx()?;
            self.port.send(&request)?;
            self.await_ack()?;
            addr += len;
            self.report((addr - offset) as u64, image.len() as u64);
        }
        Ok(())
    }

    /// Read the bank back and compare its top `image.len()` bytes with
    /// `image`.
    pub fn verify_image(&mut self, image: &[u8]) -> Result<()> {
        let size = self.update_bank_size()?;
        let offset = compute_offset(image.len(), size)?;
        self.read_bank()?;
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

    /// Probe, write and read-back verify in one shot.
    pub fn program(&mut self, image: &[u8]) -> Result<()> {
        self.probe()?;
        self.write_image(image)?;
        self.verify_image(image)
    }

    // --- Trace acquisition ---

    /// Trace geometry and mode for subsequent captures.
    pub fn set_trace_config(&mut self, config: TraceConfig) -> Result<()> {
        config.validate()?;
        self.trace = config;
        Ok(())
    }

    pub fn trace_config(&self) -> &TraceConfig {
        &self.trace
    }

    /// Run one trace request and return every address it reported, in wire
    /// order. An open trace log receives the addresses as well.
    pub fn capture(&mut self) -> Result<Vec<u32>> {
        self.ensure_open()?;
        let emu_bank = match self.banks[role_index(BankRole::Emulation)] {
            Some(slot) => slot,
            None => self.get_bank(BankRole::Emulation)?,
        };

        let request = self.trace.request(emu_bank.wire(), emu_bank.size())?;
        self.port.purge_rx()?;
        self.port.send(&request)?;

        let len = self.trace.response_len();
        let reply = &mut self.trace_buf[..len];
        self.port.recv_exact(reply)?;
        let addresses = self.trace.decode(reply)?;

        if let Some(log) = self.trace_log.as_mut() {
            for &addr in &addresses {
                log.record(addr)?;
            }
        }
        debug!("trace returned {} addresses", addresses.len());
        Ok(addresses)
    }

    /// Capture into a caller-supplied buffer; returns how many addresses
    /// were copied. Addresses past the end of `out` are dropped from the
    /// buffer but still reach the trace log.
    pub fn capture_to_buffer(&mut self, out: &mut [u32]) -> Result<usize> {
        let addresses = self.capture()?;
        let n = addresses.len().min(out.len());
        out[..n].copy_from_slice(&addresses[..n]);
        Ok(n)
    }

    /// Capture into the hit map; returns how many addresses were reported.
    pub fn capture_to_map(&mut self) -> Result<usize> {
        let addresses = self.capture()?;
        for &addr in &addresses {
            self.hit_map.record(addr);
        }
        Ok(addresses.len())
    }

    /// Capture to the trace log alone. Fails if no log is open.
    pub fn capture_to_log(&mut self) -> Result<usize> {
        if self.trace_log.is_none() {
            return Err(Error::TraceLogClosed);
        }
        Ok(self.capture()?.len())
    }

    /// Open (or replace) the trace log; it stays open across captures.
    pub fn open_trace_log(&mut self, path: &Path) -> Result<()> {
        self.trace_log = Some(TraceLog::create(path)?);
        Ok(())
    }

    pub fn close_trace_log(&mut self) -> Result<()> {
        if let Some(mut log) = self.trace_log.take() {
            log.flush()?;
        }
        Ok(())
    }

    pub fn hit_map(&self) -> &HitMap {
        &self.hit_map
    }

    pub fn hit_map_mut(&mut self) -> &mut HitMap {
        &mut self.hit_map
    }

    // --- Plumbing ---

    fn ensure_open(&self) -> Result<()> {
        if self.port.is_open() {
            Ok(())
        } else {
            Err(Error::TransportClosed)
        }
    }

    fn ensure_coherent(&self) -> Result<()> {
        self.ensure_open()?;
        if self.coherent {
            Ok(())
        } else {
            Err(Error::BankIncoherent)
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

fn role_index(role: BankRole) -> usize {
    match role {
        BankRole::Emulation => 0,
        BankRole::Persistent => 1,
        BankRole::Update => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoPort;

    impl Transport for NoPort {
        fn is_open(&self) -> bool {
            false
        }
        fn set_framing(&mut self, _: u32) -> Result<()> {
            Err(Error::TransportClosed)
        }
        fn set_read_timeout(&mut self, _: std::time::Duration) -> Result<()> {
            Err(Error::TransportClosed)
        }
        fn send(&mut self, _: &[u8]) -> Result<()> {
            Err(Error::TransportClosed)
        }
        fn recv_exact(&mut self, _: &mut [u8]) -> Result<()> {
            Err(Error::TransportClosed)
        }
        fn purge_rx(&mut self) -> Result<()> {
            Err(Error::TransportClosed)
        }
        fn purge_tx(&mut self) -> Result<()> {
            Err(Error::TransportClosed)
        }
    }

    fn sized(block: usize) -> Emulator<NoPort> {
        let mut emu = Emulator::new(NoPort);
        emu.set_block_size(block).unwrap();
        emu
    }

    #[test]
    fn misaligned_residual_realigns_first() {
        let emu = sized(0x4000);
        // 1000 bytes left: write 1000 % 256 = 232 first, then bulk.
        assert_eq!(emu.next_transfer(1000), 232);
        assert_eq!(emu.next_transfer(768), 768);
    }

    #[test]
    fn full_blocks_until_the_tail() {
        let emu = sized(0x4000);
        assert_eq!(emu.next_transfer(0x10000), 0x4000);
        assert_eq!(emu.next_transfer(0x4000), 0x4000);
        assert_eq!(emu.next_transfer(0x300), 0x300);
        assert_eq!(emu.next_transfer(100), 100);
    }

    #[test]
    fn byte_mode_blocks_are_never_exceeded() {
        let emu = sized(64);
        assert_eq!(emu.next_transfer(0x10000), 64);
        assert_eq!(emu.next_transfer(1000), 64);
        assert_eq!(emu.next_transfer(30), 30);
    }

    #[test]
    fn bulk_sizes_round_down() {
        let mut emu = Emulator::new(NoPort);
        assert_eq!(emu.set_block_size(300).unwrap(), 256);
        assert_eq!(emu.block_size(), 256);
        assert_eq!(emu.set_block_size(0x4000).unwrap(), 0x4000);
        assert_eq!(emu.set_block_size(100).unwrap(), 100);
        assert!(emu.set_block_size(0).is_err());
        assert!(emu.set_block_size(MAX_BULK_BLOCK_SIZE + 1).is_err());
    }

    #[test]
    fn closed_transport_is_refused() {
        let mut emu = Emulator::new(NoPort);
        assert!(matches!(
            emu.get_bank(BankRole::Update),
            Err(Error::TransportClosed)
        ));
        assert!(matches!(emu.read_bank(), Err(Error::TransportClosed)));
    }
}
