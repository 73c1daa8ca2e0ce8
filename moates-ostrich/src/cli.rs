// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use moates_driver::{Emulator, SerialTransport};
use moates_proto::{BankRole, BankSlot};

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "moates-ostrich")]
#[command(about = "Moates Ostrich EEPROM emulator tool")]
pub struct Cli {
    /// Serial port the emulator is attached to (e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    pub port: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Probe for the emulator and print version, vendor and serial number
    Probe,

    /// Query or move one of the three bank roles
    Bank {
        #[command(subcommand)]
        op: BankOp,
    },

    /// Read the update bank to a file
    Read {
        /// Output file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Select this update bank first (0-7, or 8 for the whole device)
        #[arg(short, long, value_parser = parse_slot)]
        bank: Option<BankSlot>,
    },

    /// Write a file into the update bank and verify it
    Write {
        /// Input image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Select this update bank first (0-7, or 8 for the whole device)
        #[arg(short, long, value_parser = parse_slot)]
        bank: Option<BankSlot>,
    },

    /// Verify the update bank against a file
    Verify {
        /// Image to compare with
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Capture execution-address traces from the running ECU
    Trace {
        /// Bytes per reported address (1-3)
        #[arg(long, default_value = "2")]
        addr_bytes: u8,

        /// Addresses per packet (1-255)
        #[arg(long, default_value = "255")]
        per_packet: u8,

        /// Packets per trace request (1-255)
        #[arg(long, default_value = "1")]
        packets: u8,

        /// Number of trace requests to issue
        #[arg(long, default_value = "1")]
        count: u32,

        /// Only report addresses between --start and --end
        #[arg(long)]
        windowed: bool,

        /// Arm capture on --start, stop on --end
        #[arg(long)]
        triggered: bool,

        /// Suppress consecutive hits of the same address
        #[arg(long)]
        non_redundant: bool,

        /// Report addresses relative to the window start
        #[arg(long)]
        relative: bool,

        /// Window or trigger start address
        #[arg(long, default_value = "0")]
        start: u16,

        /// Window or trigger end address
        #[arg(long)]
        end: Option<u16>,

        /// Append every traced address to this file, one per line
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,
    },
}

/// Bank sub-operations.
#[derive(Subcommand)]
pub enum BankOp {
    /// Print where a role points
    Get {
        /// Role: emulation, persistent or update
        #[arg(value_parser = parse_role)]
        role: BankRole,
    },

    /// Point a role at a slot
    Set {
        /// Role: emulation, persistent or update
        #[arg(value_parser = parse_role)]
        role: BankRole,

        /// Slot 0-7, or 8/"whole" for the whole device
        #[arg(value_parser = parse_slot)]
        slot: BankSlot,
    },
}

fn parse_role(s: &str) -> Result<BankRole, String> {
    match s.to_ascii_lowercase().as_str() {
        "emulation" | "emu" | "e" => Ok(BankRole::Emulation),
        "persistent" | "p" => Ok(BankRole::Persistent),
        "update" | "u" => Ok(BankRole::Update),
        _ => Err(format!("unknown bank role `{s}` (expected emulation, persistent or update)")),
    }
}

fn parse_slot(s: &str) -> Result<BankSlot, String> {
    if s.eq_ignore_ascii_case("whole") {
        return Ok(BankSlot::Whole);
    }
    let n: u8 = s.parse().map_err(|_| format!("invalid bank slot `{s}`"))?;
    BankSlot::from_wire(n).ok_or_else(|| format!("bank slot {n} is outside 0..=8"))
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let transport = SerialTransport::open(&cli.port)
        .with_context(|| format!("Failed to open serial port {}", cli.port))?;
    let mut emulator = Emulator::new(transport);

    match cli.command {
        Commands::Probe => commands::probe(&mut emulator),
        Commands::Bank { op } => match op {
            BankOp::Get { role } => commands::bank_get(&mut emulator, role),
            BankOp::Set { role, slot } => commands::bank_set(&mut emulator, role, slot),
        },
        Commands::Read { file, bank } => commands::read(&mut emulator, &file, bank),
        Commands::Write { file, bank } => commands::write(&mut emulator, &file, bank),
        Commands::Verify { file } => commands::verify(&mut emulator, &file),
        Commands::Trace {
            addr_bytes,
            per_packet,
            packets,
            count,
            windowed,
            triggered,
            non_redundant,
            relative,
            start,
            end,
            log,
        } => {
            let config = moates_proto::TraceConfig {
                windowed,
                triggered,
                non_redundant,
                relative,
                streaming: false,
                address_bytes: addr_bytes,
                addresses_per_packet: per_packet,
                packets_per_trace: packets,
                start,
                end,
            };
            commands::trace(&mut emulator, config, count, log.as_deref())
        }
    }
}
