//! 13-bit BLE-MIDI timestamps.
//!
//! A timestamp is a millisecond counter modulo 8192. The top 6 bits travel
//! in the packet header byte, the low 7 bits in the timestamp byte that
//! precedes each message.

/// Largest representable timestamp value.
pub const TIMESTAMP_MAX: u16 = 0x1FFF;

const HIGH_MASK: u8 = 0x3F;
const LOW_MASK: u8 = 0x7F;

/// A 13-bit millisecond timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(u16);

impl Timestamp {
    /// Create a timestamp, discarding bits above the 13th.
    pub const fn new(value: u16) -> Self {
        Self(value & TIMESTAMP_MAX)
    }

    /// Create a timestamp from a millisecond clock, wrapping at 8192.
    pub const fn from_millis(millis: u64) -> Self {
        Self((millis % (TIMESTAMP_MAX as u64 + 1)) as u16)
    }

    /// Rebuild a timestamp from its header (6-bit) and message (7-bit) halves.
    pub const fn from_parts(high: u8, low: u8) -> Self {
        Self((((high & HIGH_MASK) as u16) << 7) | (low & LOW_MASK) as u16)
    }

    /// The 6 bits carried by the packet header.
    pub const fn high(self) -> u8 {
        (self.0 >> 7) as u8 & HIGH_MASK
    }

    /// The 7 bits carried by the per-message timestamp byte.
    pub const fn low(self) -> u8 {
        self.0 as u8 & LOW_MASK
    }

    /// Packet header byte for a packet opened at this timestamp.
    pub const fn header_byte(self) -> u8 {
        0x80 | self.high()
    }

    /// Timestamp byte preceding a message sent at this timestamp.
    pub const fn timestamp_byte(self) -> u8 {
        0x80 | self.low()
    }

    pub const fn as_millis(self) -> u16 {
        self.0
    }
}

impl From<u16> for Timestamp {
    fn from(value: u16) -> Self {
        Self::new(value)
    }
}

/// Timestamp-high after one wrap of the low byte.
pub(crate) const fn next_high(high: u8) -> u8 {
    (high + 1) & HIGH_MASK
}

/// Running timestamp state for one packet, shared by the reader and writer.
///
/// Within a packet the low byte may only go backwards when the high part
/// has advanced by one, so both sides derive the same high value from the
/// same byte sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PacketClock {
    high: u8,
    low: Option<u8>,
}

impl PacketClock {
    pub(crate) fn open(header: u8) -> Self {
        Self {
            high: header & HIGH_MASK,
            low: None,
        }
    }

    /// Record a timestamp byte read from (or written to) the packet.
    pub(crate) fn advance(&mut self, low: u8) {
        let low = low & LOW_MASK;
        if matches!(self.low, Some(prev) if low < prev) {
            self.high = next_high(self.high);
        }
        self.low = Some(low);
    }

    /// Whether `timestamp` can be expressed by appending one timestamp byte.
    pub(crate) fn accepts(&self, timestamp: Timestamp) -> bool {
        match self.low {
            None => timestamp.high() == self.high,
            Some(prev) => {
                (timestamp.high() == self.high && timestamp.low() >= prev)
                    || (timestamp.high() == next_high(self.high) && timestamp.low() < prev)
            }
        }
    }

    /// The timestamp of the most recent timestamp byte, if any.
    pub(crate) fn current(&self) -> Option<Timestamp> {
        self.low.map(|low| Timestamp::from_parts(self.high, low))
    }

    pub(crate) fn has_timestamp(&self) -> bool {
        self.low.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_high_and_low() {
        let ts = Timestamp::new(0x1234);
        assert_eq!(ts.high(), 0x24);
        assert_eq!(ts.low(), 0x34);
        assert_eq!(Timestamp::from_parts(ts.high(), ts.low()), ts);
    }

    #[test]
    fn header_and_timestamp_bytes_have_top_bit() {
        let ts = Timestamp::from_parts(0x26, 0x08);
        assert_eq!(ts.header_byte(), 0xA6);
        assert_eq!(ts.timestamp_byte(), 0x88);
    }

    #[test]
    fn new_masks_to_13_bits() {
        assert_eq!(Timestamp::new(0xFFFF).as_millis(), TIMESTAMP_MAX);
        assert_eq!(Timestamp::from_millis(8192 + 5).as_millis(), 5);
    }

    #[test]
    fn clock_wraps_high_when_low_goes_backwards() {
        let mut clock = PacketClock::open(0xBF);
        clock.advance(0xFE);
        assert_eq!(clock.current(), Some(Timestamp::from_parts(0x3F, 0x7E)));

        clock.advance(0x81);
        assert_eq!(clock.current(), Some(Timestamp::from_parts(0x00, 0x01)));
    }

    #[test]
    fn clock_accepts_same_high_or_single_wrap() {
        let mut clock = PacketClock::open(0x85);
        assert!(clock.accepts(Timestamp::from_parts(5, 100)));
        assert!(!clock.accepts(Timestamp::from_parts(6, 0)));

        clock.advance(100);
        assert!(clock.accepts(Timestamp::from_parts(5, 100)));
        assert!(clock.accepts(Timestamp::from_parts(5, 127)));
        assert!(clock.accepts(Timestamp::from_parts(6, 3)));
        assert!(!clock.accepts(Timestamp::from_parts(5, 99)));
        assert!(!clock.accepts(Timestamp::from_parts(6, 100)));
        assert!(!clock.accepts(Timestamp::from_parts(7, 0)));
    }
}
