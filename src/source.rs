//! Raw frame sources.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use anyhow::{bail, Result};
use framepump_codec::{RawFrame, StreamConfig};

/// Reads fixed-size raw frames from any reader.
///
/// Frames are stamped with increasing timestamps spaced by the configured
/// frame duration, starting at 0. A trailing partial frame is dropped.
pub struct RawFrameSource<R> {
    reader: R,
    frame: Vec<u8>,
    frame_duration: u64,
    next_timestamp: u64,
    frames_read: u64,
}

/// [`RawFrameSource`] over a file.
pub type RawFileSource = RawFrameSource<BufReader<File>>;

impl RawFrameSource<BufReader<File>> {
    /// Open a raw frame file matching the input side of `config`.
    pub fn open(path: impl AsRef<Path>, config: &StreamConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", path.display(), e))?;
        let source = Self::from_config(BufReader::new(file), config)?;
        tracing::info!(
            "Reading {:?} {}x{} frames ({} bytes each) from {}",
            config.input_subtype,
            config.width,
            config.height,
            source.frame_size(),
            path.display()
        );
        Ok(source)
    }
}

impl<R: Read> RawFrameSource<R> {
    /// Wrap a reader producing frames of exactly `frame_size` bytes.
    pub fn new(reader: R, frame_size: usize, frame_duration: u64) -> Result<Self> {
        if frame_size == 0 {
            bail!("frame size must be non-zero");
        }
        Ok(Self {
            reader,
            frame: vec![0u8; frame_size],
            frame_duration,
            next_timestamp: 0,
            frames_read: 0,
        })
    }

    /// Wrap a reader producing frames in the input format of `config`.
    pub fn from_config(reader: R, config: &StreamConfig) -> Result<Self> {
        let Some(frame_size) = config.input_frame_size() else {
            bail!("{:?} is not a raw frame format", config.input_subtype);
        };
        Self::new(reader, frame_size, config.frame_duration())
    }

    /// Size of one frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.frame.len()
    }

    /// Number of complete frames returned so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Read the next frame, or `None` at end of input.
    ///
    /// The returned frame borrows the source's buffer until the next call.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame<'_>>> {
        let mut filled = 0;
        while filled < self.frame.len() {
            match self.reader.read(&mut self.frame[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < self.frame.len() {
            tracing::warn!(
                "Discarding trailing partial frame ({} of {} bytes)",
                filled,
                self.frame.len()
            );
            return Ok(None);
        }

        let timestamp = self.next_timestamp;
        self.next_timestamp += self.frame_duration;
        self.frames_read += 1;
        Ok(Some(
            RawFrame::new(&self.frame, timestamp).with_duration(self.frame_duration),
        ))
    }
}
