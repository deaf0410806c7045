// Host tooling crate: unwrap/expect/panic acceptable outside firmware code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod check;
mod decode;
mod dump;
mod flash;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Probe-rs chip name of the reference board.
pub const CHIP: &str = "STM32H743ZITx";

/// Firmware target triple.
pub const TARGET: &str = "thumbv7em-none-eabihf";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Fault capture firmware development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flash firmware to STM32H7 hardware via probe-rs
    Flash {
        /// Build and flash release version
        #[arg(short, long)]
        release: bool,
        /// Read the record on the board before the new image clears it
        #[arg(long)]
        dump_before: bool,
        /// Read the record when the run stops on a fault
        #[arg(long)]
        dump: bool,
    },
    /// Check the firmware and core crates build for the hardware target
    Check,
    /// Run the host test suites (unit, integration, doc)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
        /// Also build the release image and check its section placement
        #[arg(long)]
        elf: bool,
    },
    /// Decode a postmortem record from nine 32-bit words
    ///
    /// Accepts `probe-rs read b32 0x2001FFC0 9` output, plain hex words, or
    /// `0x`-prefixed words. Reads WORDS, else FILE, else stdin.
    Decode {
        /// Record words (hex)
        words: Vec<String>,
        /// Read the words from a file instead
        #[arg(short, long, conflicts_with = "words")]
        file: Option<std::path::PathBuf>,
    },
    /// Read the postmortem record from a connected board and decode it
    Dump {
        /// Record address in hex (defaults to the firmware's `.postmortem` region)
        #[arg(long, value_parser = decode::parse_word)]
        address: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Flash {
            release,
            dump_before,
            dump,
        } => flash::run(flash::FlashOptions {
            release,
            dump_before,
            dump_after: dump,
        }),
        Commands::Check => check::run(),
        Commands::Test {
            unit,
            integration,
            elf,
        } => test::run(unit, integration, elf),
        Commands::Decode { words, file } => decode::run(&words, file.as_deref()),
        Commands::Dump { address } => {
            dump::run(address.unwrap_or(postmortem::config::RECORD_ADDRESS))
        }
    }
}
