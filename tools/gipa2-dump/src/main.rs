#![forbid(unsafe_code)]

mod decode;
mod demo;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gipa2-dump",
    about = "Decode GIPA2 order lists and render demo pages into FPGA dump files."
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List the command chain of an order list
    Decode {
        /// Raw order-list bytes, or an `OL` dump file with --hex
        input: PathBuf,

        /// Address the list was built to run from (hex)
        #[arg(long, value_name = "ADDR", value_parser = parse_address, default_value = "0")]
        base: u32,

        /// Input holds hex words, one per line, as in `OL` dump files
        #[arg(long, action = clap::ArgAction::SetTrue)]
        hex: bool,
    },
    /// Render a synthetic page through the in-memory host and print buffer usage
    Demo(demo::DemoArgs),
}

/// Parses an address given in hex, with or without a `0x` prefix.
pub(crate) fn parse_address(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|err| format!("invalid address {s:?}: {err}"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Cmd::Decode { input, base, hex } => {
            let bytes =
                std::fs::read(&input).with_context(|| format!("read {}", input.display()))?;
            let commands = if hex {
                let text = String::from_utf8(bytes)
                    .with_context(|| format!("{} is not a text dump", input.display()))?;
                decode::parse_hex_words(&text)
                    .with_context(|| format!("parse {}", input.display()))?
            } else {
                bytes
            };
            let listing = decode::listing(&commands, base)
                .with_context(|| format!("decode {}", input.display()))?;
            print!("{listing}");
            Ok(())
        }
        Cmd::Demo(args) => demo::run(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_take_an_optional_prefix() {
        assert_eq!(parse_address("0x800000"), Ok(0x0080_0000));
        assert_eq!(parse_address("10000000"), Ok(0x1000_0000));
        assert!(parse_address("zz").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
