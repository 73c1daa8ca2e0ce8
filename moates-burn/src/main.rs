// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command line interface for the Moates Burn1/2 chip programmer.
//!
//! Usage:
//!   moates-burn -p /dev/ttyUSB0 -h
//!   moates-burn -p /dev/ttyUSB0 -t SST27SF512 -e
//!   moates-burn -p /dev/ttyUSB0 -t SST27SF512 -w calibration.bin
//!   moates-burn -p /dev/ttyUSB0 -t M2732A -r dump.bin

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Cli::parse();
    cli::run(args)
}
