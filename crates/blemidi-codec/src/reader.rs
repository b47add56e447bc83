use std::iter::FusedIterator;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::codec::{
    data_len, is_channel_voice, is_data, is_realtime, ReaderConfig, SYSEX_END, SYSEX_START,
};
use crate::error::{CodecError, Result};
use crate::event::{Event, TimedEvent};
use crate::timestamp::{PacketClock, Timestamp};

/// Outcome of a single [`PacketReader::decode_one`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The decoded event, if the consumed bytes completed one.
    pub event: Option<TimedEvent>,
    /// Bytes consumed from the front of the input. Always at least 1 for
    /// non-empty input, errors included.
    pub consumed: usize,
    /// SysEx dropped inside the consumed bytes (size limit or allocation
    /// failure). The rest of that SysEx is discarded up to its `0xF7`.
    pub error: Option<CodecError>,
}

impl Decoded {
    fn skip(consumed: usize) -> Self {
        Self {
            event: None,
            consumed,
            error: None,
        }
    }

    fn event(event: TimedEvent, consumed: usize) -> Self {
        Self {
            event: Some(event),
            consumed,
            error: None,
        }
    }

    fn failed(error: CodecError, consumed: usize) -> Self {
        Self {
            event: None,
            consumed,
            error: Some(error),
        }
    }

    fn after(mut self, prefix: usize) -> Self {
        self.consumed += prefix;
        self
    }
}

/// SysEx bytes collected so far. Survives packet boundaries.
#[derive(Debug, Default)]
struct SysexAssembly {
    buf: Vec<u8>,
    active: bool,
    /// Set once the payload outgrew the limit; the rest is dropped up to `0xF7`.
    overflowed: bool,
    started_at: Timestamp,
}

impl SysexAssembly {
    fn abandon(&mut self) {
        self.buf.clear();
        self.active = false;
        self.overflowed = false;
    }

    fn overflow(&mut self) {
        self.buf = Vec::new();
        self.overflowed = true;
    }
}

/// Decodes BLE-MIDI packets into MIDI events.
///
/// Call [`reset`](Self::reset) before the first byte of every packet, then
/// [`decode_one`](Self::decode_one) on the remainder until it is used up, or
/// let [`packet`](Self::packet) do both. Running status and timestamps are
/// scoped to one packet; only an unterminated SysEx carries over.
#[derive(Debug)]
pub struct PacketReader {
    clock: PacketClock,
    expect_header: bool,
    running_status: Option<u8>,
    sysex: SysexAssembly,
    config: ReaderConfig,
}

impl Default for PacketReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketReader {
    /// Create a new packet reader with default configuration.
    pub fn new() -> Self {
        Self::with_config(ReaderConfig::default())
    }

    /// Create a new packet reader with explicit configuration.
    pub fn with_config(config: ReaderConfig) -> Self {
        Self {
            clock: PacketClock::default(),
            expect_header: true,
            running_status: None,
            sysex: SysexAssembly::default(),
            config,
        }
    }

    /// Prepare for a new packet. An open SysEx stays open.
    pub fn reset(&mut self) {
        self.clock = PacketClock::default();
        self.expect_header = true;
        self.running_status = None;
    }

    /// Decode the next unit from the front of the packet remainder.
    ///
    /// Malformed input is skipped rather than reported: the returned
    /// [`Decoded`] then has no event but still consumes at least one byte,
    /// so callers always make progress. The only reported problems are
    /// SysEx size and allocation limits, carried in [`Decoded::error`];
    /// the bytes are consumed all the same and decoding continues after
    /// them.
    pub fn decode_one(&mut self, bytes: &[u8]) -> Decoded {
        let Some(&first) = bytes.first() else {
            return Decoded::skip(0);
        };

        if self.expect_header {
            self.expect_header = false;
            if is_data(first) {
                warn!(
                    header = first,
                    len = bytes.len(),
                    "invalid packet header, dropping packet"
                );
                return Decoded::skip(bytes.len());
            }
            self.clock = PacketClock::open(first);
            return Decoded::skip(1);
        }

        if self.sysex.active {
            return self.continue_sysex(bytes);
        }

        self.decode_message(bytes)
    }

    /// Reset for a new packet and iterate over the events it contains.
    pub fn packet<'r, 'p>(&'r mut self, bytes: &'p [u8]) -> Packet<'r, 'p> {
        self.reset();
        Packet {
            reader: self,
            bytes,
        }
    }

    /// Whether a SysEx message is waiting for more continuation bytes.
    pub fn sysex_in_progress(&self) -> bool {
        self.sysex.active
    }

    /// Update the SysEx size limit for subsequent messages.
    pub fn set_max_sysex_len(&mut self, max_sysex_len: usize) {
        self.config.max_sysex_len = max_sysex_len;
    }

    /// Current packet reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    fn decode_message(&mut self, bytes: &[u8]) -> Decoded {
        let first = bytes[0];

        // Running status with the previous timestamp.
        if is_data(first) {
            return self.running_message(bytes, 0);
        }

        // A status byte never follows running data without its timestamp,
        // so with no running status a high byte followed by data can only be
        // a status whose timestamp was left out.
        let timestamp_omitted = self.running_status.is_none()
            && self.clock.has_timestamp()
            && bytes.get(1).is_some_and(|b| is_data(*b));

        let mut pos = 0;
        if !timestamp_omitted {
            self.clock.advance(first);
            pos = 1;
        }

        let Some(&next) = bytes.get(pos) else {
            debug!("dangling timestamp at end of packet");
            return Decoded::skip(pos);
        };
        if is_data(next) {
            return self.running_message(bytes, pos);
        }
        pos += 1;

        match next {
            SYSEX_START => {
                self.running_status = None;
                if let Err(err) = self.start_sysex() {
                    return Decoded::failed(err, pos);
                }
                self.continue_sysex(&bytes[pos..]).after(pos)
            }
            SYSEX_END => {
                debug!("SysEx terminator without a SysEx in progress");
                Decoded::skip(pos)
            }
            status => {
                if is_channel_voice(status) {
                    self.running_status = Some(status);
                } else if !is_realtime(status) {
                    self.running_status = None;
                }
                if data_len(status).is_none() {
                    debug!(status, "undefined status byte");
                    return Decoded::skip(pos);
                }
                self.finish_message(status, bytes, pos)
            }
        }
    }

    fn running_message(&mut self, bytes: &[u8], pos: usize) -> Decoded {
        match self.running_status {
            Some(status) => self.finish_message(status, bytes, pos),
            None => {
                let run = bytes[pos..].iter().take_while(|b| is_data(**b)).count();
                debug!(len = run, "running status data without a status byte");
                Decoded::skip(pos + run)
            }
        }
    }

    fn finish_message(&mut self, status: u8, bytes: &[u8], pos: usize) -> Decoded {
        let len = data_len(status).unwrap_or(0);
        let data = &bytes[pos..];
        let available = data.iter().take(len).take_while(|b| is_data(**b)).count();
        if available < len {
            debug!(status, expected = len, available, "truncated message");
            return Decoded::skip(pos + available);
        }

        let timestamp = self.clock.current().unwrap_or_default();
        match Event::from_message(status, &data[..len]) {
            Some(event) => {
                trace!(?event, ?timestamp, "decoded event");
                Decoded::event(TimedEvent::new(timestamp, event), pos + len)
            }
            None => Decoded::skip(pos + len),
        }
    }

    fn start_sysex(&mut self) -> Result<()> {
        self.sysex.abandon();
        self.sysex.active = true;
        self.sysex.started_at = self.clock.current().unwrap_or_default();
        self.append_sysex(&[SYSEX_START])
    }

    fn continue_sysex(&mut self, bytes: &[u8]) -> Decoded {
        let mut i = 0;
        while i < bytes.len() {
            let byte = bytes[i];
            if is_data(byte) {
                let run = bytes[i..].iter().take_while(|b| is_data(**b)).count();
                if let Err(err) = self.append_sysex(&bytes[i..i + run]) {
                    return Decoded::failed(err, i + run);
                }
                i += run;
                continue;
            }

            // A timestamp byte can itself read 0xF7, so the terminator is
            // the high byte not followed by another one.
            let next = bytes.get(i + 1).copied();
            if byte == SYSEX_END && !next.is_some_and(|b| !is_data(b)) {
                return self.finish_sysex(i + 1);
            }

            match next {
                Some(SYSEX_END) => {
                    self.clock.advance(byte);
                    return self.finish_sysex(i + 2);
                }
                // Trailing timestamp of a packet whose SysEx continues in
                // the next one.
                None => {
                    self.clock.advance(byte);
                    i += 1;
                }
                Some(next) if is_data(next) => {
                    debug!(byte, "stray timestamp inside SysEx");
                    self.clock.advance(byte);
                    i += 1;
                }
                Some(next) if is_realtime(next) => {
                    self.clock.advance(byte);
                    let timestamp = self.clock.current().unwrap_or_default();
                    return match Event::from_message(next, &[]) {
                        Some(event) => Decoded::event(TimedEvent::new(timestamp, event), i + 2),
                        None => Decoded::skip(i + 2),
                    };
                }
                Some(next) => {
                    warn!(
                        status = next,
                        len = self.sysex.buf.len(),
                        "SysEx interrupted by status byte, discarding"
                    );
                    self.sysex.abandon();
                    if i == 0 {
                        return self.decode_message(bytes);
                    }
                    return Decoded::skip(i);
                }
            }
        }
        Decoded::skip(i)
    }

    fn append_sysex(&mut self, data: &[u8]) -> Result<()> {
        if self.sysex.overflowed {
            return Ok(());
        }

        let size = self.sysex.buf.len() + data.len();
        let max = self.config.max_sysex_len;
        // Leave room for the terminator.
        if size >= max {
            warn!(size, max, "SysEx exceeds size limit, discarding");
            self.sysex.overflow();
            return Err(CodecError::SysexTooLarge { size, max });
        }
        if self.sysex.buf.try_reserve(data.len()).is_err() {
            self.sysex.overflow();
            return Err(CodecError::Alloc {
                requested: data.len(),
            });
        }
        self.sysex.buf.extend_from_slice(data);
        Ok(())
    }

    /// Close the SysEx on its `0xF7`, which ends `consumed`.
    fn finish_sysex(&mut self, consumed: usize) -> Decoded {
        if self.sysex.overflowed {
            debug!("end of discarded SysEx");
            self.sysex.abandon();
            return Decoded::skip(consumed);
        }
        if self.sysex.buf.try_reserve(1).is_err() {
            self.sysex.abandon();
            return Decoded::failed(CodecError::Alloc { requested: 1 }, consumed);
        }
        self.sysex.buf.push(SYSEX_END);
        self.sysex.active = false;

        let payload = Bytes::from(std::mem::take(&mut self.sysex.buf));
        trace!(len = payload.len(), "SysEx complete");
        Decoded::event(
            TimedEvent::new(self.sysex.started_at, Event::SysEx { payload }),
            consumed,
        )
    }
}

/// Lazy iterator over the events of one packet, from [`PacketReader::packet`].
///
/// A dropped SysEx is yielded as an `Err` in its place; decoding carries on
/// with the bytes after it.
#[derive(Debug)]
pub struct Packet<'r, 'p> {
    reader: &'r mut PacketReader,
    bytes: &'p [u8],
}

impl Iterator for Packet<'_, '_> {
    type Item = Result<TimedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.bytes.is_empty() {
            let decoded = self.reader.decode_one(self.bytes);
            self.bytes = &self.bytes[decoded.consumed..];
            if let Some(err) = decoded.error {
                return Some(Err(err));
            }
            if let Some(event) = decoded.event {
                return Some(Ok(event));
            }
        }
        None
    }
}

impl FusedIterator for Packet<'_, '_> {}
