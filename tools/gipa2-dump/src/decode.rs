use std::fmt::Write as _;

use anyhow::{bail, Context};
use gipa2_protocol::{walk, Command};

/// Reads the word format of `OL`/`OLWork` dump files: one eight-digit hex word per line,
/// first byte first.
pub fn parse_hex_words(text: &str) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() / 10 * 4);
    for (line, word) in text.lines().enumerate() {
        let word = word.trim();
        if word.is_empty() {
            continue;
        }
        if word.len() != 8 {
            bail!("line {}: expected 8 hex digits, found {word:?}", line + 1);
        }
        let value = u32::from_str_radix(word, 16)
            .with_context(|| format!("line {}: bad hex word {word:?}", line + 1))?;
        out.extend_from_slice(&value.to_be_bytes());
    }
    Ok(out)
}

/// Lists the command chain of an order list, one command per line.
///
/// `base` is the address the list's `COM_HEAD` links were written against.
pub fn listing(commands: &[u8], base: u32) -> anyhow::Result<String> {
    let mut out = String::new();
    let mut count = 0usize;
    for step in walk(commands, base) {
        let step = match step {
            Ok(step) => step,
            Err(err) => bail!("order list is malformed after {count} commands: {err}"),
        };
        let address = base.wrapping_add(step.offset as u32);
        let cmd = Command::decode(&commands[step.offset..])
            .with_context(|| format!("decode {} at {address:08x}", step.layout.opcode))?;
        let _ = writeln!(
            out,
            "{address:08x} {:<26} {}",
            step.layout.opcode.name(),
            describe(&cmd)
        );
        count += 1;
    }
    tracing::debug!(count, "decoded order list");
    Ok(out)
}

fn describe(cmd: &Command) -> String {
    match cmd {
        Command::ComHead { next } => format!("next={next:08x}"),
        Command::PageInit | Command::ResetClip | Command::BandDma | Command::ComBlockEnd => {
            String::new()
        }
        Command::SetRop2 { rop2 } => format!("rop2={rop2:#04x}"),
        Command::SetPenetrationColor { color } => format!("color={color:02x?}"),
        other => format!("{other:?}"),
    }
}
