// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for emulator operations.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use moates_driver::{Emulator, Transport};
use moates_proto::{BankRole, BankSlot, TraceConfig};

/// Probe for the emulator and print its identity.
pub fn probe<T: Transport>(emulator: &mut Emulator<T>) -> Result<()> {
    let id = emulator.probe()?;
    println!("Found device! Version is: {}", id.device);
    println!("Vendor ID: {:#04x}", id.vendor_id);
    print!("Serial number:");
    for byte in id.serial_number {
        print!(" {byte:02x}");
    }
    println!();
    Ok(())
}

/// Print where `role` points on the device.
pub fn bank_get<T: Transport>(emulator: &mut Emulator<T>, role: BankRole) -> Result<()> {
    let slot = emulator.get_bank(role)?;
    println!("{role:?} role is at {slot}.");
    Ok(())
}

/// Point `role` at `slot`.
pub fn bank_set<T: Transport>(
    emulator: &mut Emulator<T>,
    role: BankRole,
    slot: BankSlot,
) -> Result<()> {
    emulator.set_bank(slot, role)?;
    println!("{role:?} role now at {slot}.");
    for role in BankRole::ALL {
        if let Some(slot) = emulator.mirrored_bank(role) {
            println!("  {role:?}: {slot}");
        }
    }
    Ok(())
}

/// Read the update bank into `file`.
pub fn read<T: Transport>(
    emulator: &mut Emulator<T>,
    file: &Path,
    bank: Option<BankSlot>,
) -> Result<()> {
    emulator.probe()?;
    if let Some(slot) = bank {
        emulator.set_bank(slot, BankRole::Update)?;
    }
    let size = emulator.update_bank_size()?;

    let bar = progress_bar(size as u64)?;
    let sink = bar.clone();
    emulator.set_progress(Box::new(move |done, _| sink.set_position(done)));

    let data = match emulator.read_bank() {
        Ok(data) => data.to_vec(),
        Err(e) => {
            bar.abandon();
            return Err(e.into());
        }
    };
    bar.finish_with_message("done");

    fs::write(file, &data).with_context(|| format!("Failed to write {}", file.display()))?;
    println!("Read {} bytes to {}.", data.len(), file.display());
    Ok(())
}

/// Write `file` into the update bank and verify it.
pub fn write<T: Transport>(
    emulator: &mut Emulator<T>,
    file: &Path,
    bank: Option<BankSlot>,
) -> Result<()> {
    let image = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    emulator.probe()?;
    if let Some(slot) = bank {
        emulator.set_bank(slot, BankRole::Update)?;
    }
    let size = emulator.update_bank_size()?;
    println!(
        "Image: {} ({} bytes, offset {} in a {} byte window)",
        file.display(),
        image.len(),
        size.saturating_sub(image.len()),
        size
    );

    let bar = progress_bar(image.len() as u64)?;
    let sink = bar.clone();
    emulator.set_progress(Box::new(move |done, _| sink.set_position(done)));

    let result = emulator
        .write_image(&image)
        .and_then(|()| emulator.verify_image(&image));
    match result {
        Ok(()) => {
            bar.finish_with_message("done");
            println!("Wrote and verified {}.", file.display());
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e.into())
        }
    }
}

/// Verify the update bank against `file`.
pub fn verify<T: Transport>(emulator: &mut Emulator<T>, file: &Path) -> Result<()> {
    let image = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    emulator.probe()?;
    emulator.verify_image(&image)?;
    println!("Update bank matches {}.", file.display());
    Ok(())
}

/// Issue `count` trace requests, accumulate the hit map and print a summary.
pub fn trace<T: Transport>(
    emulator: &mut Emulator<T>,
    config: TraceConfig,
    count: u32,
    log: Option<&Path>,
) -> Result<()> {
    emulator.probe()?;
    emulator.set_trace_config(config)?;
    if let Some(path) = log {
        emulator.open_trace_log(path)?;
    }

    let mut reported = 0usize;
    for request in 1..=count {
        reported += emulator.capture_to_map()?;
        println!(
            "trace {request}/{count}: {reported} addresses so far, {} distinct",
            emulator.hit_map().hit_count()
        );
    }
    emulator.close_trace_log()?;

    println!(
        "Captured {reported} addresses, {} distinct.",
        emulator.hit_map().hit_count()
    );
    if let Some(path) = log {
        println!("Trace written to {}.", path.display());
    }
    Ok(())
}

fn progress_bar(total: u64) -> Result<ProgressBar> {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(bar)
}
