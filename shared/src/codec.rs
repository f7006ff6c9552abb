//! Byte-level framing for protocol commands.
//!
//! Every frame starts with an optional timestamp record followed by a
//! one byte packet tag and a bincode encoded payload:
//!
//! ```text
//! [TIMESTAMP u8][u32 ms LE]?  [tag u8]  [payload ...]
//! ```

use crate::commands::PacketTag;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Largest datagram the server reads or writes.
pub const MAX_FRAME_SIZE: usize = 2048;

/// Longest string carried in any command.
pub const MAX_STRING_LEN: usize = 254;

/// Marker byte introducing the optional timestamp record.
pub const TIMESTAMP_MARKER: u8 = 0x01;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,
    #[error("frame truncated inside {0}")]
    Truncated(&'static str),
    #[error("{tag:?} requires a timestamp")]
    MissingTimestamp { tag: PacketTag },
    #[error("string of {0} bytes exceeds protocol limit")]
    StringTooLong(usize),
    #[error("payload error: {0}")]
    Payload(#[from] bincode::Error),
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_FRAME_SIZE as u64)
}

/// Builds a single outgoing frame.
pub struct FrameWriter {
    buffer: Vec<u8>,
}

impl FrameWriter {
    pub fn new(tag: PacketTag) -> Self {
        Self {
            buffer: vec![tag as u8],
        }
    }

    /// Starts a frame carrying the sender's clock in milliseconds.
    pub fn with_timestamp(timestamp: u32, tag: PacketTag) -> Self {
        let mut buffer = Vec::with_capacity(16);
        buffer.push(TIMESTAMP_MARKER);
        buffer.extend_from_slice(&timestamp.to_le_bytes());
        buffer.push(tag as u8);
        Self { buffer }
    }

    /// Appends the payload and returns the finished frame.
    pub fn payload<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Vec<u8>, CodecError> {
        let body = wire_options().serialize(value)?;
        self.buffer.extend_from_slice(&body);
        Ok(self.buffer)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// A frame split into its header fields. The tag is raw so that unknown
/// ids can be reported instead of rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub timestamp: Option<u32>,
    pub tag: u8,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn split(data: &'a [u8]) -> Result<Self, CodecError> {
        let (timestamp, rest) = match data.first() {
            None => return Err(CodecError::Empty),
            Some(&TIMESTAMP_MARKER) => {
                let stamp = data
                    .get(1..5)
                    .ok_or(CodecError::Truncated("timestamp"))?;
                let stamp = u32::from_le_bytes([stamp[0], stamp[1], stamp[2], stamp[3]]);
                (Some(stamp), &data[5..])
            }
            Some(_) => (None, data),
        };

        let (&tag, payload) = rest.split_first().ok_or(CodecError::Truncated("tag"))?;
        Ok(Frame {
            timestamp,
            tag,
            payload,
        })
    }

    /// Known tag of this frame, if any.
    pub fn packet_tag(&self) -> Option<PacketTag> {
        PacketTag::from_u8(self.tag)
    }

    pub fn read<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(wire_options().deserialize(self.payload)?)
    }

    pub fn require_timestamp(&self, tag: PacketTag) -> Result<u32, CodecError> {
        self.timestamp.ok_or(CodecError::MissingTimestamp { tag })
    }
}

/// Cuts `text` to at most [`MAX_STRING_LEN`] bytes on a char boundary.
pub fn clamp_string(text: &str) -> &str {
    if text.len() <= MAX_STRING_LEN {
        return text;
    }
    let mut end = MAX_STRING_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    log::debug!("Truncating {} byte string for transmission", text.len());
    &text[..end]
}

/// Rejects received strings longer than the protocol allows.
pub fn check_string(text: String) -> Result<String, CodecError> {
    if text.len() > MAX_STRING_LEN {
        Err(CodecError::StringTooLong(text.len()))
    } else {
        Ok(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrafficCounter {
    pub packets: u64,
    pub bytes: u64,
}

/// Per-tag packet and byte counters for both directions.
#[derive(Debug, Default, Clone)]
pub struct TrafficStats {
    incoming: BTreeMap<u8, TrafficCounter>,
    outgoing: BTreeMap<u8, TrafficCounter>,
}

impl TrafficStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one frame. Frames that cannot be split are counted under tag 0.
    pub fn account(&mut self, direction: Direction, data: &[u8]) {
        let tag = Frame::split(data).map(|frame| frame.tag).unwrap_or(0);
        let table = match direction {
            Direction::Incoming => &mut self.incoming,
            Direction::Outgoing => &mut self.outgoing,
        };
        let counter = table.entry(tag).or_default();
        counter.packets += 1;
        counter.bytes += data.len() as u64;
    }

    pub fn counter(&self, direction: Direction, tag: PacketTag) -> TrafficCounter {
        let table = match direction {
            Direction::Incoming => &self.incoming,
            Direction::Outgoing => &self.outgoing,
        };
        table.get(&(tag as u8)).copied().unwrap_or_default()
    }

    pub fn total(&self, direction: Direction) -> TrafficCounter {
        let table = match direction {
            Direction::Incoming => &self.incoming,
            Direction::Outgoing => &self.outgoing,
        };
        table.values().fold(TrafficCounter::default(), |acc, c| TrafficCounter {
            packets: acc.packets + c.packets,
            bytes: acc.bytes + c.bytes,
        })
    }

    /// Human readable per-tag rates over `elapsed_secs`.
    pub fn summary(&self, elapsed_secs: f32) -> String {
        let elapsed = elapsed_secs.max(f32::EPSILON);
        let mut out = String::new();
        for (label, table) in [("in", &self.incoming), ("out", &self.outgoing)] {
            for (tag, counter) in table {
                let name = PacketTag::from_u8(*tag)
                    .map(|t| format!("{:?}", t))
                    .unwrap_or_else(|| format!("#{}", tag));
                out.push_str(&format!(
                    "{:>3} {:<24} {:>8.1} pkt/s {:>10.1} B/s\n",
                    label,
                    name,
                    counter.packets as f32 / elapsed,
                    counter.bytes as f32 / elapsed
                ));
            }
        }
        if out.is_empty() {
            out.push_str("no traffic recorded\n");
        }
        out
    }

    pub fn reset(&mut self) {
        self.incoming.clear();
        self.outgoing.clear();
    }
}
