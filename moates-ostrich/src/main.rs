// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command line interface for the Moates Ostrich EEPROM emulator.
//!
//! Usage:
//!   moates-ostrich --port /dev/ttyUSB0 probe
//!   moates-ostrich --port /dev/ttyUSB0 bank get update
//!   moates-ostrich --port /dev/ttyUSB0 write tune.bin --bank 1
//!   moates-ostrich --port /dev/ttyUSB0 trace --count 10 --log trace.txt

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Cli::parse();
    cli::run(args)
}
