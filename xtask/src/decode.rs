use anyhow::{bail, Context, Result};
use colored::Colorize;
use postmortem::{CauseCode, PostmortemRecord, RecordError};
use std::fmt::Write as _;
use std::io::Read as _;
use std::num::ParseIntError;
use std::path::Path;

pub fn run(words: &[String], file: Option<&Path>) -> Result<()> {
    let text = if !words.is_empty() {
        words.join(" ")
    } else if let Some(path) = file {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read record words from stdin")?;
        text
    };

    let record = PostmortemRecord::from_words(parse_record(&text)?);
    print_record(&record);
    Ok(())
}

/// One hex word, with or without `0x`.
pub fn parse_word(token: &str) -> Result<u32, ParseIntError> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(&digits.replace('_', ""), 16)
}

/// Nine record words from free-form text.
///
/// Address columns (`2001ffc0:`) are skipped so `probe-rs read` output can be
/// pasted as is.
pub fn parse_record(text: &str) -> Result<[u32; PostmortemRecord::WORDS]> {
    let mut words = Vec::with_capacity(PostmortemRecord::WORDS);
    for token in text.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() || token.ends_with(':') {
            continue;
        }
        words.push(parse_word(token).with_context(|| format!("Not a hex word: {token:?}"))?);
    }
    match <[u32; PostmortemRecord::WORDS]>::try_from(words.as_slice()) {
        Ok(words) => Ok(words),
        Err(_) => bail!(
            "Expected {} record words, found {}",
            PostmortemRecord::WORDS,
            words.len()
        ),
    }
}

/// Human-readable report, without colour.
pub fn render(record: &PostmortemRecord) -> String {
    let mut out = String::new();
    match record.validate() {
        Err(RecordError::NoRecord(key)) => {
            let _ = writeln!(out, "No postmortem record (key {key:#010x}).");
            let _ = writeln!(
                out,
                "The previous boot ended without a captured fault; the other words are undefined."
            );
            return out;
        }
        Err(RecordError::UnknownCause(_)) | Ok(_) => {}
    }

    let cause = match record.cause_code() {
        Ok(code) => describe(code),
        Err(_) => format!("unknown cause code {:#x}", record.cause),
    };
    let _ = writeln!(out, "Cause:          {cause}");
    let _ = writeln!(out, "Return address: {:#010x}", record.return_address);
    let _ = writeln!(out, "Stack pointer:  {:#010x}", record.stack_pointer);
    let _ = writeln!(
        out,
        "r0..r3:         {:#010x} {:#010x} {:#010x} {:#010x}",
        record.r0, record.r1, record.r2, record.r3
    );
    let _ = writeln!(out, "Diagnostic:     {}", record.diagnostic);
    out
}

fn describe(code: CauseCode) -> String {
    format!("{} (code {:#04x})", code.describe(), code.raw())
}

pub fn print_record(record: &PostmortemRecord) {
    println!();
    if record.is_valid() {
        println!("{}", "⚠ Postmortem record found".yellow().bold());
    } else {
        println!("{}", "✓ No fault captured".green().bold());
    }
    for line in render(record).lines() {
        println!("   {line}");
    }
    if record.is_valid() {
        println!(
            "   {}",
            "Resolve the return address with: arm-none-eabi-addr2line -e <elf> <address>".dimmed()
        );
    }
    println!();
}
