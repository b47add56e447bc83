//! Bluetooth LE MIDI packet codec.
//!
//! blemidi turns BLE-MIDI characteristic values into timestamped MIDI events
//! and back. The `blemidi` binary (feature `cli`) decodes captured packets
//! and encodes event streams from the command line.
//!
//! # Crate Structure
//!
//! - [`codec`]: packet reader, packet writer and the event model
//!
//! ```
//! use blemidi::{Event, PacketReader, PacketWriter, Timestamp};
//!
//! let mut writer = PacketWriter::new(20)?;
//! writer.push_event(&Event::note_on(0, 60, 100), Timestamp::new(1000), |_| {})?;
//! let packet = writer.flush().unwrap_or_default();
//!
//! let mut reader = PacketReader::new();
//! let events = reader.packet(&packet).collect::<blemidi::Result<Vec<_>>>()?;
//! assert_eq!(events[0].event, Event::note_on(0, 60, 100));
//! # Ok::<(), blemidi::CodecError>(())
//! ```

/// Re-export codec types.
pub mod codec {
    pub use blemidi_codec::*;
}

pub use blemidi_codec::{
    CodecError, Event, PacketReader, PacketWriter, ReaderConfig, Result, TimedEvent, Timestamp,
};
