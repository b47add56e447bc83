/// Errors that can occur during BLE-MIDI encoding/decoding.
///
/// Malformed packets are not errors: the reader skips what it cannot
/// decode and keeps going. These variants cover configuration mistakes,
/// invalid events handed to the writer, and SysEx buffer limits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The writer capacity cannot hold even a single message.
    #[error("packet capacity too small ({capacity} bytes, min {min})")]
    CapacityTooSmall { capacity: usize, min: usize },

    /// An event field is out of range for the MIDI wire format.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A new SysEx or a non-realtime event was pushed while a SysEx is still open.
    #[error("SysEx in progress (missing 0xF7 terminator)")]
    SysexInProgress,

    /// A SysEx continuation fragment was pushed with no SysEx open.
    #[error("SysEx continuation without a 0xF0 start")]
    SysexNotStarted,

    /// The reassembled SysEx exceeds the configured maximum size.
    #[error("SysEx too large ({size} bytes, max {max})")]
    SysexTooLarge { size: usize, max: usize },

    /// Growing the SysEx buffer failed.
    #[error("failed to allocate {requested} bytes for SysEx payload")]
    Alloc { requested: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
