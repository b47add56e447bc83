use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::codec::{is_channel_voice, is_realtime, MIN_PACKET_CAPACITY, SYSEX_END, SYSEX_START};
use crate::error::{CodecError, Result};
use crate::event::Event;
use crate::timestamp::{PacketClock, Timestamp};

/// Encodes MIDI events into capacity-bounded BLE-MIDI packets.
///
/// Packets are handed to the `on_packet_full` callback of
/// [`push_event`](Self::push_event) as soon as the next message no longer
/// fits. The last, partial packet stays buffered until the caller takes it
/// with [`flush`](Self::flush) or reads it through [`data`](Self::data).
#[derive(Debug)]
pub struct PacketWriter {
    buf: BytesMut,
    capacity: usize,
    clock: PacketClock,
    running_status: Option<u8>,
    sysex_open: bool,
}

impl PacketWriter {
    /// Create a writer producing packets of at most `capacity` bytes.
    ///
    /// For a BLE link this is the negotiated ATT MTU minus 3.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < MIN_PACKET_CAPACITY {
            return Err(CodecError::CapacityTooSmall {
                capacity,
                min: MIN_PACKET_CAPACITY,
            });
        }
        Ok(Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            clock: PacketClock::default(),
            running_status: None,
            sysex_open: false,
        })
    }

    /// Encode one event sent at `timestamp`.
    ///
    /// Every completed packet is passed to `on_packet_full` before encoding
    /// continues in a fresh one. The event is validated first, so on error
    /// nothing has been written.
    ///
    /// `SysEx` events may be fragments of one message: a payload starting
    /// with `0xF0` opens it, one ending with `0xF7` closes it. While a SysEx
    /// is open only further fragments and real-time events are accepted.
    pub fn push_event<F>(
        &mut self,
        event: &Event,
        timestamp: Timestamp,
        mut on_packet_full: F,
    ) -> Result<()>
    where
        F: FnMut(Bytes),
    {
        event.validate()?;

        match event {
            Event::SysEx { payload } => self.push_sysex(payload, timestamp, &mut on_packet_full),
            _ if self.sysex_open && !event.is_realtime() => Err(CodecError::SysexInProgress),
            _ => {
                self.push_message(event, timestamp, &mut on_packet_full);
                Ok(())
            }
        }
    }

    /// Take the buffered packet, if any.
    ///
    /// An open SysEx continues in the next packet.
    pub fn flush(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        let packet = self.buf.split().freeze();
        self.clock = PacketClock::default();
        self.running_status = None;
        Some(packet)
    }

    /// Whether a partial packet is buffered.
    pub fn has_data(&self) -> bool {
        !self.buf.is_empty()
    }

    /// The buffered, not yet flushed packet bytes.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub fn data_size(&self) -> usize {
        self.buf.len()
    }

    /// Maximum packet size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes left in the current packet.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Whether a SysEx has been started but not terminated.
    pub fn sysex_in_progress(&self) -> bool {
        self.sysex_open
    }

    fn push_message<F: FnMut(Bytes)>(
        &mut self,
        event: &Event,
        timestamp: Timestamp,
        on_packet_full: &mut F,
    ) {
        let Some((data, len)) = event.data_bytes() else {
            return;
        };
        let status = event.status();

        if self.has_data()
            && (!self.clock.accepts(timestamp)
                || self.encoded_len(status, timestamp, len) > self.remaining())
        {
            self.flush_to(on_packet_full);
        }
        if !self.has_data() {
            self.open(timestamp);
        }

        let running = self.is_running(status);
        if !running || self.clock.current() != Some(timestamp) {
            self.put_timestamp(timestamp);
        }
        if !running {
            self.buf.put_u8(status);
        }
        self.buf.put_slice(&data[..len]);

        if is_channel_voice(status) {
            self.running_status = Some(status);
        } else if !is_realtime(status) {
            self.running_status = None;
        }
        trace!(?event, ?timestamp, running, "encoded event");
    }

    fn push_sysex<F: FnMut(Bytes)>(
        &mut self,
        payload: &[u8],
        timestamp: Timestamp,
        on_packet_full: &mut F,
    ) -> Result<()> {
        let starts = payload.first() == Some(&SYSEX_START);
        let ends = payload.len() > usize::from(starts) && payload.last() == Some(&SYSEX_END);
        if starts && self.sysex_open {
            return Err(CodecError::SysexInProgress);
        }
        if !starts && !self.sysex_open {
            return Err(CodecError::SysexNotStarted);
        }
        let mut body = &payload[usize::from(starts)..payload.len() - usize::from(ends)];

        if starts {
            self.make_room(2, timestamp, on_packet_full);
            self.put_timestamp(timestamp);
            self.buf.put_u8(SYSEX_START);
            self.running_status = None;
            self.sysex_open = true;
        }

        while !body.is_empty() {
            if self.has_data() && self.remaining() == 0 {
                self.flush_to(on_packet_full);
            }
            if !self.has_data() {
                self.open(timestamp);
            }
            let n = body.len().min(self.remaining());
            self.buf.put_slice(&body[..n]);
            body = &body[n..];
        }

        if ends {
            // The terminator and its timestamp always share a packet.
            self.make_room(2, timestamp, on_packet_full);
            self.put_timestamp(timestamp);
            self.buf.put_u8(SYSEX_END);
            self.sysex_open = false;
            trace!(?timestamp, "SysEx terminated");
        }
        Ok(())
    }

    /// Make sure `needed` bytes starting with a timestamp byte fit in the current packet.
    fn make_room<F: FnMut(Bytes)>(
        &mut self,
        needed: usize,
        timestamp: Timestamp,
        on_packet_full: &mut F,
    ) {
        if self.has_data() && (!self.clock.accepts(timestamp) || self.remaining() < needed) {
            self.flush_to(on_packet_full);
        }
        if !self.has_data() {
            self.open(timestamp);
        }
    }

    fn is_running(&self, status: u8) -> bool {
        is_channel_voice(status) && self.running_status == Some(status)
    }

    fn encoded_len(&self, status: u8, timestamp: Timestamp, len: usize) -> usize {
        let running = self.is_running(status);
        let needs_timestamp = !running || self.clock.current() != Some(timestamp);
        len + usize::from(!running) + usize::from(needs_timestamp)
    }

    fn open(&mut self, timestamp: Timestamp) {
        let header = timestamp.header_byte();
        self.buf.put_u8(header);
        self.clock = PacketClock::open(header);
        self.running_status = None;
    }

    fn put_timestamp(&mut self, timestamp: Timestamp) {
        let byte = timestamp.timestamp_byte();
        self.buf.put_u8(byte);
        self.clock.advance(byte);
    }

    fn flush_to<F: FnMut(Bytes)>(&mut self, on_packet_full: &mut F) {
        if let Some(packet) = self.flush() {
            debug!(len = packet.len(), capacity = self.capacity, "packet full");
            on_packet_full(packet);
        }
    }
}
