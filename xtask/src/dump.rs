use anyhow::{Context, Result};
use colored::Colorize;
use postmortem::PostmortemRecord;
use std::process::Command;

use crate::{decode, CHIP};

pub fn run(address: u32) -> Result<()> {
    println!();
    println!(
        "{}",
        format!("📡 Reading postmortem record at {address:#010x}...")
            .cyan()
            .bold()
    );

    // Halting is not needed: the region is only written on the fault path,
    // which never returns.
    let output = Command::new("probe-rs")
        .arg("read")
        .arg("--chip")
        .arg(CHIP)
        .arg("b32")
        .arg(format!("{address:#x}"))
        .arg(PostmortemRecord::WORDS.to_string())
        .output()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !output.status.success() {
        eprintln!("{}", "✗ Read failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("Read failed - check that the probe is connected and the device is powered");
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let words = decode::parse_record(&text)
        .with_context(|| format!("Unexpected probe-rs output:\n{text}"))?;
    println!("   {}", text.trim().dimmed());

    decode::print_record(&PostmortemRecord::from_words(words));
    Ok(())
}
