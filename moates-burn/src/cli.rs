// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.
//!
//! The flag surface matches the classic front-end: `-h` is the hardware
//! check (help moves to `--help`), and exactly one action flag is required.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser};

use moates_driver::{Programmer, SerialTransport};
use moates_proto::ChipKind;

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "moates-burn")]
#[command(about = "Moates Burn1/2 command line interface")]
#[command(disable_help_flag = true)]
pub struct Cli {
    /// Serial port the programmer is attached to (e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    pub port: String,

    /// Chip type: SST27SF512, AM29F040, EECIV, AT29C256 or M2732A
    #[arg(short = 't', long = "type", value_parser = parse_chip)]
    pub chip: Option<ChipKind>,

    #[command(flatten)]
    pub action: Action,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

/// Mutually exclusive actions; exactly one is required.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct Action {
    /// Test for Burn1/2 hardware on the port
    #[arg(short = 'h', long)]
    pub hwcheck: bool,

    /// Erase and blank-check the chip
    #[arg(short, long)]
    pub erase: bool,

    /// Blank-check the chip
    #[arg(short, long)]
    pub blank_check: bool,

    /// Write and verify FILE to the chip
    #[arg(short, long, value_name = "FILE")]
    pub write: Option<PathBuf>,

    /// Read the chip to FILE
    #[arg(short, long, value_name = "FILE")]
    pub read: Option<PathBuf>,

    /// Verify the chip against FILE
    #[arg(short, long, value_name = "FILE")]
    pub verify: Option<PathBuf>,
}

fn parse_chip(s: &str) -> Result<ChipKind, String> {
    s.parse()
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let mut transport = SerialTransport::open(&cli.port)
        .with_context(|| format!("Failed to open serial port {}", cli.port))?;
    println!("Opened com port: {} OK", cli.port);

    if cli.action.hwcheck {
        return commands::probe(&mut transport);
    }

    let Some(chip) = cli.chip else {
        bail!("a chip type is required for actions other than the hardware check");
    };
    let mut programmer = Programmer::new(transport, chip);

    if cli.action.erase {
        commands::erase(&mut programmer)
    } else if cli.action.blank_check {
        commands::blank_check(&mut programmer)
    } else if let Some(file) = cli.action.write {
        commands::write(&mut programmer, &file)
    } else if let Some(file) = cli.action.read {
        commands::read(&mut programmer, &file)
    } else if let Some(file) = cli.action.verify {
        commands::verify(&mut programmer, &file)
    } else {
        unreachable!("clap enforces one action");
    }
}
