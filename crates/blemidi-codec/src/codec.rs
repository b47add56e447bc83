//! Wire-level constants and byte classification shared by reader and writer.
//!
//! Packet layout:
//! ```text
//! ┌──────────┬───────────┬────────┬──────────┬───────────┬────────┬─────
//! │ Header   │ Timestamp │ Status │ Data...  │ Timestamp │ Status │ ...
//! │ 10hhhhhh │ 1lllllll  │ 1sssss │ 0ddddddd │ 1lllllll  │ ...    │
//! └──────────┴───────────┴────────┴──────────┴───────────┴────────┴─────
//! ```
//! Status bytes may be omitted (running status), and with them the
//! timestamp when it did not change. SysEx data may continue directly after
//! the header of the next packet.

/// SysEx start status byte.
pub const SYSEX_START: u8 = 0xF0;

/// SysEx terminator (EOX).
pub const SYSEX_END: u8 = 0xF7;

/// Smallest usable writer capacity: header + timestamp + status + 2 data bytes.
pub const MIN_PACKET_CAPACITY: usize = 5;

/// Default cap on a reassembled SysEx payload: 64 KiB.
pub const DEFAULT_MAX_SYSEX: usize = 64 * 1024;

/// Returns true for bytes with the top bit set (header, timestamp, status).
#[inline]
pub fn is_high(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Returns true for 7-bit MIDI data bytes.
#[inline]
pub fn is_data(byte: u8) -> bool {
    byte & 0x80 == 0
}

/// Returns true for channel-voice status bytes (`0x80..=0xEF`).
#[inline]
pub fn is_channel_voice(status: u8) -> bool {
    (0x80..=0xEF).contains(&status)
}

/// Returns true for one-byte system real-time status bytes (`0xF8..=0xFF`).
#[inline]
pub fn is_realtime(status: u8) -> bool {
    status >= 0xF8
}

/// Number of data bytes that follow a status byte.
///
/// Returns `None` for SysEx (variable length) and for undefined statuses.
pub fn data_len(status: u8) -> Option<usize> {
    match status {
        0x80..=0xBF | 0xE0..=0xEF => Some(2),
        0xC0..=0xDF => Some(1),
        0xF1 | 0xF3 => Some(1),
        0xF2 => Some(2),
        0xF6 => Some(0),
        0xF8 | 0xFA | 0xFB | 0xFC | 0xFE | 0xFF => Some(0),
        _ => None,
    }
}

/// Configuration for the packet reader.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Maximum reassembled SysEx size in bytes, `0xF0`/`0xF7` included. Default: 64 KiB.
    pub max_sysex_len: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_sysex_len: DEFAULT_MAX_SYSEX,
        }
    }
}
