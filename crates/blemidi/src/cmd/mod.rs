use clap::{Args, Subcommand};
use std::path::PathBuf;

use blemidi_codec::DEFAULT_MAX_SYSEX;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod version;

/// Default BLE ATT MTU before any exchange.
pub const DEFAULT_MTU: usize = 23;

/// ATT notification overhead (opcode + handle).
pub const ATT_OVERHEAD: usize = 3;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode hex BLE-MIDI packets into events.
    Decode(DecodeArgs),
    /// Encode JSON events into hex BLE-MIDI packets.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex packets, decoded in order (e.g. "a6 88 90 3c 40").
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub packets: Vec<String>,
    /// Read packets from file, one hex packet per line.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Maximum reassembled SysEx size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_SYSEX)]
    pub max_sysex: usize,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Negotiated ATT MTU; packets are at most MTU - 3 bytes.
    #[arg(long, env = "BLEMIDI_MTU", default_value_t = DEFAULT_MTU)]
    pub mtu: usize,
    /// Read events from file instead of stdin, one JSON object per line.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Non-empty, non-comment input lines with their 1-based line numbers.
pub(crate) fn input_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}
