use blemidi_codec::{PacketReader, ReaderConfig};
use tracing::{debug, info};

use crate::cmd::{input_lines, DecodeArgs};
use crate::exit::{codec_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{bytes_hex::decode_packet, print_events, EventRow, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let packets = match &args.file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
            input_lines(&text)
                .map(|(line, packet)| parse(&format!("line {line}"), packet))
                .collect::<CliResult<Vec<_>>>()?
        }
        None => args
            .packets
            .iter()
            .enumerate()
            .map(|(i, packet)| parse(&format!("packet {i}"), packet))
            .collect::<CliResult<Vec<_>>>()?,
    };

    let rows = decode_packets(&packets, args.max_sysex)?;
    info!(packets = packets.len(), events = rows.len(), "decoded");
    print_events(&rows, format);
    Ok(SUCCESS)
}

fn parse(context: &str, packet: &str) -> CliResult<Vec<u8>> {
    decode_packet(packet)
        .map_err(|err| CliError::new(DATA_INVALID, format!("{context}: invalid hex: {err}")))
}

/// Run every packet through one reader so SysEx can span packets.
pub(crate) fn decode_packets(packets: &[Vec<u8>], max_sysex_len: usize) -> CliResult<Vec<EventRow>> {
    let mut reader = PacketReader::with_config(ReaderConfig { max_sysex_len });
    let mut rows = Vec::new();
    for (index, packet) in packets.iter().enumerate() {
        debug!(index, len = packet.len(), "decoding packet");
        for event in reader.packet(packet) {
            let event = event.map_err(|err| codec_error(&format!("packet {index}"), err))?;
            rows.push(EventRow::new(index, event));
        }
    }
    if reader.sysex_in_progress() {
        debug!("input ended inside a SysEx");
    }
    Ok(rows)
}
