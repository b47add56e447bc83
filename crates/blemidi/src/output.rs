use std::io::IsTerminal;

use blemidi_codec::{Event, TimedEvent};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use self::bytes_hex::encode_packet;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A decoded event and the index of the packet that completed it.
#[derive(Serialize)]
pub struct EventRow {
    pub packet: usize,
    pub timestamp: u16,
    pub event: Event,
}

impl EventRow {
    pub fn new(packet: usize, timed: TimedEvent) -> Self {
        Self {
            packet,
            timestamp: timed.timestamp.as_millis(),
            event: timed.event,
        }
    }
}

#[derive(Serialize)]
struct PacketOutput {
    size: usize,
    packet: String,
}

pub fn print_events(rows: &[EventRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PACKET", "TIMESTAMP", "EVENT"]);
            for row in rows {
                table.add_row(vec![
                    row.packet.to_string(),
                    row.timestamp.to_string(),
                    describe(&row.event),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "packet={} ts={} {}",
                    row.packet,
                    row.timestamp,
                    describe(&row.event)
                );
            }
        }
    }
}

pub fn print_packets<P: AsRef<[u8]>>(packets: &[P], format: OutputFormat) {
    for packet in packets {
        let packet = packet.as_ref();
        match format {
            OutputFormat::Json => {
                let out = PacketOutput {
                    size: packet.len(),
                    packet: encode_packet(packet),
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Table | OutputFormat::Pretty => println!("{}", encode_packet(packet)),
        }
    }
}

/// One-line human readable form of an event.
pub fn describe(event: &Event) -> String {
    match event {
        Event::NoteOff {
            channel,
            note,
            velocity,
        } => format!("NoteOff ch={channel} note={note} vel={velocity}"),
        Event::NoteOn {
            channel,
            note,
            velocity,
        } => format!("NoteOn ch={channel} note={note} vel={velocity}"),
        Event::PolyPressure {
            channel,
            note,
            value,
        } => format!("PolyPressure ch={channel} note={note} value={value}"),
        Event::ControlChange {
            channel,
            controller,
            value,
        } => format!("ControlChange ch={channel} cc={controller} value={value}"),
        Event::ProgramChange { channel, program } => {
            format!("ProgramChange ch={channel} program={program}")
        }
        Event::ChannelPressure { channel, value } => {
            format!("ChannelPressure ch={channel} value={value}")
        }
        Event::PitchBend { channel, value } => format!("PitchBend ch={channel} value={value}"),
        Event::SysEx { payload } => {
            format!("SysEx len={} {}", payload.len(), encode_packet(payload))
        }
        Event::TimeCode { value } => format!("TimeCode value={value}"),
        Event::SongPosition { position } => format!("SongPosition position={position}"),
        Event::SongSelect { song } => format!("SongSelect song={song}"),
        other => format!("{other:?}"),
    }
}

/// Hex helpers for packets on the command line.
pub mod bytes_hex {
    /// Lowercase hex, one space between bytes.
    pub fn encode_packet(bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|b| hex::encode([*b]))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse a hex packet. Whitespace, `:` and `,` between bytes are ignored.
    pub fn decode_packet(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
        let digits: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':' && *c != ',')
            .collect();
        hex::decode(digits)
    }
}
