use anyhow::{bail, Context, Result};
use colored::Colorize;
use postmortem::config::{RECORD_ADDRESS, RECORD_REGION_BYTES};
use std::process::Command;
use std::time::Instant;

use crate::{decode, dump, CHIP, TARGET};

/// What to do around the flash.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlashOptions {
    pub release: bool,
    /// Read the board's record before flashing. The new image reads and
    /// clears it on its first boot.
    pub dump_before: bool,
    /// Read the record once `probe-rs run` returns (the core halted at the
    /// fault breakpoint).
    pub dump_after: bool,
}

pub fn run(options: FlashOptions) -> Result<()> {
    build(options.release)?;
    check_record_section(options.release)?;

    if options.dump_before {
        println!("{}", "Record left by the firmware currently on the board:".bold());
        if let Err(e) = dump::run(RECORD_ADDRESS) {
            eprintln!("{}", format!("  ⚠ Could not read the old record: {e:#}").yellow());
        }
    }

    // Flash with probe-rs
    println!("{}", "📡 Flashing to STM32H7...".cyan().bold());
    println!(
        "   {}",
        "RTT logs follow; the run ends when the core halts on a fault (debugger attached)".dimmed()
    );
    println!();

    let flash_start = Instant::now();
    let status = Command::new("probe-rs")
        .arg("run")
        .arg(binary_path(options.release))
        .arg("--chip")
        .arg(CHIP)
        .arg("--probe-index")
        .arg("0")
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    println!();
    if !status.success() {
        // probe-rs exits non-zero when the core stops on a breakpoint it did
        // not expect, which is how the fault path halts with a debugger.
        eprintln!(
            "{}",
            format!(
                "⚠ probe-rs exited with {status} after {:.2}s",
                flash_start.elapsed().as_secs_f64()
            )
            .yellow()
            .bold()
        );
        if !options.dump_after {
            bail!("probe-rs run failed - rerun with --dump to read the postmortem record");
        }
    }

    if options.dump_after {
        dump::run(RECORD_ADDRESS)?;
    } else {
        println!(
            "   {}",
            "After a fault, 'cargo xtask dump' reads the postmortem record".dimmed()
        );
    }

    Ok(())
}

/// Build the hardware image.
pub fn build(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };
    println!();
    println!(
        "{}",
        format!("🔨 Building firmware ({mode} mode)...").cyan().bold()
    );

    let build_start = Instant::now();
    let mut build_cmd = Command::new("cargo");
    build_cmd
        .args(["build", "-p", "firmware", "--features", "hardware"])
        .arg("--target")
        .arg(TARGET);
    if release {
        build_cmd.arg("--release");
    }

    let build_output = build_cmd.output().context("Failed to run cargo build")?;
    if !build_output.status.success() {
        eprintln!("{}", "✗ Build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&build_output.stderr));
        bail!("Build failed");
    }

    println!(
        "{}",
        format!(
            "✓ Build successful in {:.2}s",
            build_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    Ok(())
}

pub fn binary_path(release: bool) -> String {
    let profile = if release { "release" } else { "debug" };
    format!("target/{TARGET}/{profile}/firmware")
}

/// `.postmortem` as reported by `size -A -x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSection {
    pub size: u32,
    pub address: u32,
}

/// Find `.postmortem` in `size -A -x` output (`name  0xsize  0xaddr`).
pub fn parse_record_section(size_output: &str) -> Option<RecordSection> {
    size_output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next()? != ".postmortem" {
            return None;
        }
        let size = decode::parse_word(fields.next()?).ok()?;
        let address = decode::parse_word(fields.next()?).ok()?;
        Some(RecordSection { size, address })
    })
}

/// The record must be where `dump` and the boot reader look for it.
pub fn verify_record_section(section: Option<RecordSection>) -> Result<RecordSection> {
    let Some(section) = section else {
        bail!(".postmortem section missing from the image (is memory.x in use?)");
    };
    if section.address != RECORD_ADDRESS {
        bail!(
            ".postmortem linked at {:#010x}, expected {RECORD_ADDRESS:#010x}",
            section.address
        );
    }
    if usize::try_from(section.size).map_or(true, |size| size > RECORD_REGION_BYTES) {
        bail!(
            ".postmortem is {} bytes, region holds {RECORD_REGION_BYTES}",
            section.size
        );
    }
    Ok(section)
}

fn check_record_section(release: bool) -> Result<()> {
    let output = Command::new("rust-size")
        .args(["-A", "-x"])
        .arg(binary_path(release))
        .output();

    let text = match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
        _ => {
            println!(
                "   {}",
                "rust-size not found (cargo install cargo-binutils); record placement not checked"
                    .yellow()
            );
            println!();
            return Ok(());
        }
    };

    let section = verify_record_section(parse_record_section(&text))?;
    println!(
        "{}",
        format!(
            "✓ Postmortem record at {:#010x} ({} of {RECORD_REGION_BYTES} bytes, not zeroed at boot)",
            section.address, section.size
        )
        .green()
    );
    println!();
    Ok(())
}
