//! Raw frames and the input/output units that cross the transform boundary.

use crate::{Buffer, BufferError, MediaSubtype};

/// Timestamps and durations are expressed in 100-nanosecond ticks.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// A raw frame delivered by the frame source.
///
/// The bytes stay owned by the caller; the pump copies them into a freshly
/// allocated [`InputUnit`] and does not keep the borrow past the call.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    /// Raw frame bytes.
    pub data: &'a [u8],
    /// Presentation timestamp in ticks. Non-decreasing across a stream.
    pub timestamp: u64,
    /// Frame duration in ticks. `None` uses the configured frame rate.
    pub duration: Option<u64>,
}

impl<'a> RawFrame<'a> {
    /// Create a frame whose duration follows the configured frame rate.
    #[must_use]
    pub fn new(data: &'a [u8], timestamp: u64) -> Self {
        Self {
            data,
            timestamp,
            duration: None,
        }
    }

    /// Set a frame-specific duration.
    #[must_use]
    pub fn with_duration(mut self, duration: u64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Length of the frame in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length frame.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One buffered, timestamped unit submitted to a transform.
///
/// Created and owned by the pump; transforms only borrow it during
/// `submit` and must copy anything they need to keep.
#[derive(Debug)]
pub struct InputUnit {
    buffer: Buffer,
    timestamp: u64,
    duration: u64,
}

impl InputUnit {
    /// Copy a raw frame into a new input unit.
    pub fn from_frame(frame: &RawFrame<'_>, default_duration: u64) -> Result<Self, BufferError> {
        Ok(Self {
            buffer: Buffer::from_slice(frame.data)?,
            timestamp: frame.timestamp,
            duration: frame.duration.unwrap_or(default_duration),
        })
    }

    /// The frame bytes.
    pub fn data(&self) -> Result<&[u8], BufferError> {
        self.buffer.read_locked()
    }

    /// The underlying buffer.
    #[must_use]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Presentation timestamp in ticks.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Duration in ticks.
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.duration
    }
}

/// One output unit produced by a single drain call.
///
/// A unit may span several buffers; its payload is their used bytes in
/// order. No timestamp is carried.
#[derive(Debug, Default)]
pub struct OutputUnit {
    buffers: Vec<Buffer>,
}

impl OutputUnit {
    /// Wrap a list of buffers.
    #[must_use]
    pub fn new(buffers: Vec<Buffer>) -> Self {
        Self { buffers }
    }

    /// Wrap a single buffer.
    #[must_use]
    pub fn single(buffer: Buffer) -> Self {
        Self {
            buffers: vec![buffer],
        }
    }

    /// The buffers making up this unit.
    #[must_use]
    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    /// Append every buffer's used bytes to `out`, returning the number of
    /// bytes appended.
    pub fn append_to(&self, out: &mut Vec<u8>) -> Result<usize, BufferError> {
        let mut appended = 0;
        for buffer in &self.buffers {
            let bytes = buffer.read_locked()?;
            out.extend_from_slice(bytes);
            appended += bytes.len();
        }
        Ok(appended)
    }
}

/// Calculate the expected frame size for a raw subtype.
///
/// Returns `None` for compressed subtypes, whose sizes vary per frame.
#[must_use]
pub fn expected_frame_size(width: u32, height: u32, subtype: MediaSubtype) -> Option<usize> {
    let pixels = width as usize * height as usize;
    match subtype {
        MediaSubtype::Nv12 | MediaSubtype::I420 => Some(pixels + pixels / 2), // Y + UV (4:2:0)
        MediaSubtype::Yuy2 => Some(pixels * 2),
        MediaSubtype::Rgb32 => Some(pixels * 4),
        MediaSubtype::H264 | MediaSubtype::Hevc => None,
    }
}
