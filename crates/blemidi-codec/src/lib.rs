//! BLE-MIDI packet codec.
//!
//! Decodes Bluetooth LE MIDI characteristic values into timestamped MIDI
//! events and encodes events back into MTU-bounded packets. Every packet
//! starts with a header byte carrying the high 6 bits of a 13-bit
//! millisecond timestamp; every message is preceded by a timestamp byte
//! carrying the low 7 bits, unless running status lets both be omitted.
//!
//! The codec is transport-agnostic: feed it the bytes of one notification
//! at a time and hand the packets it produces to whatever writes the
//! characteristic.

pub mod codec;
pub mod error;
pub mod event;
pub mod reader;
pub mod timestamp;
pub mod writer;

pub use codec::{ReaderConfig, DEFAULT_MAX_SYSEX, MIN_PACKET_CAPACITY, SYSEX_END, SYSEX_START};
pub use error::{CodecError, Result};
pub use event::{Event, TimedEvent, PITCH_BEND_CENTER};
pub use reader::{Decoded, Packet, PacketReader};
pub use timestamp::{Timestamp, TIMESTAMP_MAX};
pub use writer::PacketWriter;
