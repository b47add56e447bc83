use std::io::Read;

use blemidi_codec::{Event, PacketWriter, Timestamp};
use bytes::Bytes;
use serde::Deserialize;
use tracing::info;

use crate::cmd::{input_lines, EncodeArgs, ATT_OVERHEAD};
use crate::exit::{codec_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_packets, OutputFormat};

/// One input line: `{"timestamp": 1234, "event": {"type": "note_on", ...}}`.
#[derive(Deserialize, Debug)]
struct EventLine {
    /// Milliseconds; wrapped to 13 bits.
    timestamp: u64,
    event: Event,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let text = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("read {}", path.display()), err))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|err| io_error("read stdin", err))?;
            text
        }
    };

    let packets = encode_lines(&text, args.mtu)?;
    info!(packets = packets.len(), mtu = args.mtu, "encoded");
    print_packets(&packets, format);
    Ok(SUCCESS)
}

pub(crate) fn encode_lines(text: &str, mtu: usize) -> CliResult<Vec<Bytes>> {
    let mut writer = PacketWriter::new(mtu.saturating_sub(ATT_OVERHEAD))
        .map_err(|err| codec_error(&format!("mtu {mtu}"), err))?;
    let mut packets = Vec::new();

    for (line, json) in input_lines(text) {
        let context = format!("line {line}");
        let input: EventLine = serde_json::from_str(json)
            .map_err(|err| CliError::new(DATA_INVALID, format!("{context}: {err}")))?;
        writer
            .push_event(
                &input.event,
                Timestamp::from_millis(input.timestamp),
                |packet| packets.push(packet),
            )
            .map_err(|err| codec_error(&context, err))?;
    }
    if writer.sysex_in_progress() {
        return Err(CliError::new(
            DATA_INVALID,
            "input ended inside a SysEx (missing 0xF7)",
        ));
    }
    packets.extend(writer.flush());
    Ok(packets)
}
