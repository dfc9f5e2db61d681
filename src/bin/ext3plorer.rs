use std::num::ParseIntError;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use ext3plorer::{FilesystemSession, Radix, Result};
use itertools::Itertools;
use serde_json::json;

/// Inspect and patch ext3 metadata on a raw image.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the filesystem image
    image: PathBuf,

    /// Inode number to inspect (starting at 1)
    inode: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print decoded metadata as JSON
    Print {
        #[arg(long = "type", value_enum, default_value_t = Kind::All)]
        kind: Kind,

        /// Render integer fields in hexadecimal
        #[arg(long)]
        hex: bool,
    },

    /// Overwrite one field of the inode in place
    ModifyInode {
        /// Inode field name, e.g. i_uid or i_mode
        #[arg(long)]
        field: String,

        /// New value, decimal or 0x-prefixed hex
        #[arg(long, value_parser = parse_int)]
        value: u64,
    },

    /// Hex dump of the inode's first data block
    Data,

    /// Hex dump of raw image bytes
    Dump {
        #[arg(long, value_parser = parse_int)]
        offset: u64,

        #[arg(long, default_value_t = 64)]
        count: usize,

        /// Print row offsets in hexadecimal
        #[arg(long)]
        hex_offsets: bool,

        /// Omit the ASCII column
        #[arg(long)]
        no_ascii: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Sb,
    Gd,
    Inode,
    Xattr,
    All,
}

fn parse_int(arg: &str) -> std::result::Result<u64, ParseIntError> {
    match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => arg.parse(),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let session = FilesystemSession::open(&cli.image, cli.inode)?;

    match &cli.command {
        Command::Print { kind, hex } => print(&session, *kind, *hex),
        Command::ModifyInode { field, value } => {
            let report = session.patch_inode_field(field, *value)?;
            println!("{}", to_json(&report));
            Ok(())
        }
        Command::Data => {
            let offset = session.data_block_offset()?;
            let data = session.data_block()?;
            hex_dump(&data, offset, false, true);
            Ok(())
        }
        Command::Dump {
            offset,
            count,
            hex_offsets,
            no_ascii,
        } => {
            let data = session.read_raw(*offset, *count)?;
            println!("File: {}", session.image().path().display());
            hex_dump(&data, *offset, *hex_offsets, !*no_ascii);
            Ok(())
        }
    }
}

fn print(session: &FilesystemSession, kind: Kind, hex: bool) -> Result<()> {
    let radix = if hex { Radix::Hex } else { Radix::Dec };

    let value = match kind {
        Kind::Sb => json!(session.read_superblock()?.with_radix(radix)),
        Kind::Gd => json!(session.group_descriptor()?.with_radix(radix)),
        Kind::Inode => json!(session.inode()?.with_radix(radix)),
        Kind::Xattr => json!(session.extended_attributes()?),
        Kind::All => json!({
            "geometry": session.geometry(),
            "superblock": session.read_superblock()?.with_radix(radix),
            "group_descriptor": session.group_descriptor()?.with_radix(radix),
            "inode": session.inode()?.with_radix(radix),
            "xattr": session.extended_attributes()?,
        }),
    };

    println!("{}", to_json(&value));
    Ok(())
}

fn to_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("<unserializable: {err}>"))
}

fn hex_dump(data: &[u8], base: u64, hex_offsets: bool, ascii: bool) {
    println!("Offset    00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F");
    println!("---------------------------------------------------------");

    for (row, chunk) in data.chunks(16).enumerate() {
        let address = base + row as u64 * 16;
        let address = if hex_offsets {
            format!("{address:08X}")
        } else {
            format!("{address:08}")
        };
        let bytes = chunk.iter().map(|byte| format!("{byte:02X}")).join(" ");

        if ascii {
            let text: String = chunk
                .iter()
                .map(|&byte| {
                    if (32..=126).contains(&byte) {
                        byte as char
                    } else {
                        '.'
                    }
                })
                .collect();
            println!("{address}  {bytes:<47}   {text}");
        } else {
            println!("{address}  {bytes}");
        }
    }
}
