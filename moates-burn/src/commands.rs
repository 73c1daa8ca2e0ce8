// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for programmer operations.

use std::fs;
use std::io::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use moates_driver::{Programmer, Transport};

/// Probe for the device and print its identity.
pub fn probe<T: Transport>(transport: &mut T) -> Result<()> {
    let id = moates_driver::burn::probe_device(transport)?;
    println!("Found device! Version is: {id}");
    Ok(())
}

/// Erase the chip and confirm it reads back blank.
pub fn erase<T: Transport>(programmer: &mut Programmer<T>) -> Result<()> {
    let name = programmer.chip().name;
    programmer.probe()?;

    print!("Erasing {name}... ");
    std::io::stdout().flush()?;
    programmer.erase_chip()?;
    println!("OK");

    print!("Blank-checking {name}... ");
    std::io::stdout().flush()?;
    if !programmer.verify_blank()? {
        bail!("chip did not read back blank after the erase");
    }
    println!("OK");
    Ok(())
}

/// Check that every byte of the chip reads 0xFF.
pub fn blank_check<T: Transport>(programmer: &mut Programmer<T>) -> Result<()> {
    programmer.probe()?;
    if programmer.verify_blank()? {
        println!("Chip is blank.");
        Ok(())
    } else {
        bail!("chip is not blank")
    }
}

/// Write `file` to the chip and verify the result.
pub fn write<T: Transport>(programmer: &mut Programmer<T>, file: &Path) -> Result<()> {
    let image = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let chip = *programmer.chip();
    println!(
        "Image:  {} ({} bytes, offset {} on a {} byte chip)",
        file.display(),
        image.len(),
        chip.size.saturating_sub(image.len()),
        chip.size
    );

    let bar = progress_bar(image.len() as u64)?;
    let sink = bar.clone();
    programmer.set_progress(Box::new(move |done, _| sink.set_position(done)));

    match programmer.program(&image) {
        Ok(()) => {
            bar.finish_with_message("done");
            println!("Wrote and verified {} on {}.", file.display(), chip.name);
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e.into())
        }
    }
}

/// Read the chip into `file`.
pub fn read<T: Transport>(programmer: &mut Programmer<T>, file: &Path) -> Result<()> {
    programmer.probe()?;
    let chip = *programmer.chip();

    let bar = progress_bar(chip.size as u64)?;
    let sink = bar.clone();
    programmer.set_progress(Box::new(move |done, _| sink.set_position(done)));

    let data = match programmer.read_chip() {
        Ok(data) => data.to_vec(),
        Err(e) => {
            bar.abandon();
            return Err(e.into());
        }
    };
    bar.finish_with_message("done");

    fs::write(file, &data).with_context(|| format!("Failed to write {}", file.display()))?;
    println!("Read {} bytes from {} to {}.", data.len(), chip.name, file.display());
    Ok(())
}

/// Compare the chip against `file`.
pub fn verify<T: Transport>(programmer: &mut Programmer<T>, file: &Path) -> Result<()> {
    let image = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    programmer.probe()?;
    programmer.verify_image(&image)?;
    println!("Chip matches {}.", file.display());
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
