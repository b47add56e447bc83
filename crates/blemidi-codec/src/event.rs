//! MIDI events carried over BLE-MIDI.

use bytes::Bytes;

use crate::codec::{is_data, SYSEX_END, SYSEX_START};
use crate::error::{CodecError, Result};
use crate::timestamp::Timestamp;

/// Pitch bend center offset between the 14-bit wire value and the signed value.
pub const PITCH_BEND_CENTER: i16 = 0x2000;

/// A decoded (or to-be-encoded) MIDI message.
///
/// Channel-voice channels are 0-based (`0..=15`). `SysEx` payloads hold the
/// raw message including the `0xF0` start and `0xF7` end bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Event {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    PolyPressure { channel: u8, note: u8, value: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, value: u8 },
    /// Signed 14-bit bend, `-8192..=8191`, 0 is center.
    PitchBend { channel: u8, value: i16 },
    #[cfg_attr(feature = "serde", serde(rename = "sysex"))]
    SysEx { payload: Bytes },
    /// MIDI time code quarter frame (`0xF1`).
    TimeCode { value: u8 },
    /// Song position pointer in MIDI beats (`0xF2`), `0..=16383`.
    SongPosition { position: u16 },
    SongSelect { song: u8 },
    TuneRequest,
    Clock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
}

impl Event {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::NoteOn {
            channel,
            note,
            velocity,
        }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::NoteOff {
            channel,
            note,
            velocity,
        }
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::ControlChange {
            channel,
            controller,
            value,
        }
    }

    pub fn pitch_bend(channel: u8, value: i16) -> Self {
        Self::PitchBend { channel, value }
    }

    /// A SysEx event (or fragment) from raw bytes.
    pub fn sysex(payload: impl Into<Bytes>) -> Self {
        Self::SysEx {
            payload: payload.into(),
        }
    }

    /// The full status byte, channel included for channel-voice messages.
    ///
    /// A `SysEx` reports `0xF0` even when it is a continuation fragment.
    pub fn status(&self) -> u8 {
        match self {
            Event::NoteOff { channel, .. } => 0x80 | (channel & 0x0F),
            Event::NoteOn { channel, .. } => 0x90 | (channel & 0x0F),
            Event::PolyPressure { channel, .. } => 0xA0 | (channel & 0x0F),
            Event::ControlChange { channel, .. } => 0xB0 | (channel & 0x0F),
            Event::ProgramChange { channel, .. } => 0xC0 | (channel & 0x0F),
            Event::ChannelPressure { channel, .. } => 0xD0 | (channel & 0x0F),
            Event::PitchBend { channel, .. } => 0xE0 | (channel & 0x0F),
            Event::SysEx { .. } => SYSEX_START,
            Event::TimeCode { .. } => 0xF1,
            Event::SongPosition { .. } => 0xF2,
            Event::SongSelect { .. } => 0xF3,
            Event::TuneRequest => 0xF6,
            Event::Clock => 0xF8,
            Event::Start => 0xFA,
            Event::Continue => 0xFB,
            Event::Stop => 0xFC,
            Event::ActiveSensing => 0xFE,
            Event::Reset => 0xFF,
        }
    }

    /// The channel of a channel-voice message.
    pub fn channel(&self) -> Option<u8> {
        match self {
            Event::NoteOff { channel, .. }
            | Event::NoteOn { channel, .. }
            | Event::PolyPressure { channel, .. }
            | Event::ControlChange { channel, .. }
            | Event::ProgramChange { channel, .. }
            | Event::ChannelPressure { channel, .. }
            | Event::PitchBend { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    pub fn is_channel_voice(&self) -> bool {
        self.channel().is_some()
    }

    /// One-byte system real-time message (clock, transport, sensing, reset).
    pub fn is_realtime(&self) -> bool {
        matches!(
            self,
            Event::Clock
                | Event::Start
                | Event::Continue
                | Event::Stop
                | Event::ActiveSensing
                | Event::Reset
        )
    }

    /// Check every field against its wire range.
    pub fn validate(&self) -> Result<()> {
        if let Some(channel) = self.channel() {
            check_range("channel", channel as i32, 0, 15)?;
        }
        match self {
            Event::NoteOff { note, velocity, .. } | Event::NoteOn { note, velocity, .. } => {
                check_data("note", *note)?;
                check_data("velocity", *velocity)
            }
            Event::PolyPressure { note, value, .. } => {
                check_data("note", *note)?;
                check_data("value", *value)
            }
            Event::ControlChange {
                controller, value, ..
            } => {
                check_data("controller", *controller)?;
                check_data("value", *value)
            }
            Event::ProgramChange { program, .. } => check_data("program", *program),
            Event::ChannelPressure { value, .. } => check_data("value", *value),
            Event::PitchBend { value, .. } => check_range(
                "pitch bend",
                *value as i32,
                -(PITCH_BEND_CENTER as i32),
                PITCH_BEND_CENTER as i32 - 1,
            ),
            Event::SysEx { payload } => validate_sysex(payload),
            Event::TimeCode { value } => check_data("time code", *value),
            Event::SongPosition { position } => {
                check_range("song position", *position as i32, 0, 0x3FFF)
            }
            Event::SongSelect { song } => check_data("song", *song),
            Event::TuneRequest
            | Event::Clock
            | Event::Start
            | Event::Continue
            | Event::Stop
            | Event::ActiveSensing
            | Event::Reset => Ok(()),
        }
    }

    /// Decode a fixed-length message from its status and data bytes.
    ///
    /// `data` must hold exactly the number of bytes `codec::data_len` gives
    /// for `status`. A NoteOn with velocity 0 comes back as NoteOff.
    pub(crate) fn from_message(status: u8, data: &[u8]) -> Option<Self> {
        let channel = status & 0x0F;
        let d0 = data.first().copied().unwrap_or(0);
        let d1 = data.get(1).copied().unwrap_or(0);
        let event = match status {
            0x80..=0x8F => Event::note_off(channel, d0, d1),
            0x90..=0x9F if d1 == 0 => Event::note_off(channel, d0, 0),
            0x90..=0x9F => Event::note_on(channel, d0, d1),
            0xA0..=0xAF => Event::PolyPressure {
                channel,
                note: d0,
                value: d1,
            },
            0xB0..=0xBF => Event::control_change(channel, d0, d1),
            0xC0..=0xCF => Event::ProgramChange {
                channel,
                program: d0,
            },
            0xD0..=0xDF => Event::ChannelPressure { channel, value: d0 },
            0xE0..=0xEF => {
                let wire = (d0 as i16) | ((d1 as i16) << 7);
                Event::pitch_bend(channel, wire - PITCH_BEND_CENTER)
            }
            0xF1 => Event::TimeCode { value: d0 },
            0xF2 => Event::SongPosition {
                position: (d0 as u16) | ((d1 as u16) << 7),
            },
            0xF3 => Event::SongSelect { song: d0 },
            0xF6 => Event::TuneRequest,
            0xF8 => Event::Clock,
            0xFA => Event::Start,
            0xFB => Event::Continue,
            0xFC => Event::Stop,
            0xFE => Event::ActiveSensing,
            0xFF => Event::Reset,
            _ => return None,
        };
        Some(event)
    }

    /// Data bytes of a fixed-length message; `None` for SysEx.
    pub(crate) fn data_bytes(&self) -> Option<([u8; 2], usize)> {
        let bytes = match self {
            Event::NoteOff { note, velocity, .. } | Event::NoteOn { note, velocity, .. } => {
                ([*note, *velocity], 2)
            }
            Event::PolyPressure { note, value, .. } => ([*note, *value], 2),
            Event::ControlChange {
                controller, value, ..
            } => ([*controller, *value], 2),
            Event::ProgramChange { program, .. } => ([*program, 0], 1),
            Event::ChannelPressure { value, .. } => ([*value, 0], 1),
            Event::PitchBend { value, .. } => {
                let wire = value.wrapping_add(PITCH_BEND_CENTER) as u16;
                ([(wire & 0x7F) as u8, (wire >> 7) as u8 & 0x7F], 2)
            }
            Event::TimeCode { value } => ([*value, 0], 1),
            Event::SongPosition { position } => {
                ([(*position & 0x7F) as u8, (*position >> 7) as u8 & 0x7F], 2)
            }
            Event::SongSelect { song } => ([*song, 0], 1),
            Event::SysEx { .. } => return None,
            _ => ([0, 0], 0),
        };
        Some(bytes)
    }
}

/// An event together with the BLE-MIDI timestamp it was sent at.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedEvent {
    pub timestamp: Timestamp,
    pub event: Event,
}

impl TimedEvent {
    pub fn new(timestamp: Timestamp, event: Event) -> Self {
        Self { timestamp, event }
    }
}

fn check_data(field: &str, value: u8) -> Result<()> {
    check_range(field, value as i32, 0, 0x7F)
}

fn check_range(field: &str, value: i32, min: i32, max: i32) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CodecError::InvalidEvent(format!(
            "{field} {value} out of range {min}..={max}"
        )))
    }
}

fn validate_sysex(payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        return Err(CodecError::InvalidEvent("empty SysEx payload".into()));
    }
    let start = usize::from(payload[0] == SYSEX_START);
    let ends = payload.len() > start && payload[payload.len() - 1] == SYSEX_END;
    let end = payload.len() - usize::from(ends);
    match payload[start..end].iter().position(|b| !is_data(*b)) {
        Some(offset) => Err(CodecError::InvalidEvent(format!(
            "SysEx byte 0x{:02X} at offset {} is not a data byte",
            payload[start + offset],
            start + offset
        ))),
        None => Ok(()),
    }
}
