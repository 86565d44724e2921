use std::collections::VecDeque;

use super::{E_BUFFER_TOO_SMALL, E_INVALID_ARG, E_NOT_ACCEPTING, E_UNEXPECTED};
use crate::{
    Buffer, ConfigError, InputUnit, MediaFormat, OutputRequirements, OutputUnit, SubmitError,
    TransformHandle, TransformStatus,
};

/// Passthrough transform that holds back a fixed number of frames.
///
/// Input and output must be the same raw format. Each submitted frame is
/// released unchanged once `delay` newer frames have arrived, so the first
/// `delay` cycles of a stream produce no output, like an encoder warming up.
/// `end_of_stream` releases everything still held.
///
/// The pump allocates output buffers (`provides_own_buffers == false`); one
/// frame fits in `min_buffer_size` bytes.
#[derive(Debug)]
pub struct DelayLine {
    delay: usize,
    format: Option<MediaFormat>,
    frame_size: usize,
    held: VecDeque<Vec<u8>>,
    released: VecDeque<Vec<u8>>,
    streaming: bool,
    ended: bool,
}

impl DelayLine {
    /// Create a delay line holding back `delay` frames.
    #[must_use]
    pub fn new(delay: usize) -> Self {
        Self {
            delay,
            format: None,
            frame_size: 0,
            held: VecDeque::new(),
            released: VecDeque::new(),
            streaming: false,
            ended: false,
        }
    }

    /// Configured delay in frames.
    #[must_use]
    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Frames currently held back or waiting to be drained.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.held.len() + self.released.len()
    }
}

impl TransformHandle for DelayLine {
    fn configure(&mut self, input: &MediaFormat, output: &MediaFormat) -> Result<(), ConfigError> {
        if self.streaming {
            return Err(ConfigError::not_ready("delay line is streaming"));
        }
        if input.subtype != output.subtype {
            return Err(ConfigError::rejected(format!(
                "passthrough cannot convert {:?} to {:?}",
                input.subtype, output.subtype
            )));
        }
        if (input.width, input.height) != (output.width, output.height) {
            return Err(ConfigError::rejected(format!(
                "passthrough cannot scale {}x{} to {}x{}",
                input.width, input.height, output.width, output.height
            )));
        }
        let frame_size = input.frame_size().ok_or_else(|| {
            ConfigError::rejected(format!("{:?} is not a raw frame format", input.subtype))
        })?;

        self.frame_size = frame_size;
        self.format = Some(input.clone());
        tracing::debug!(
            subtype = ?input.subtype,
            width = input.width,
            height = input.height,
            delay = self.delay,
            "Delay line configured"
        );
        Ok(())
    }

    fn input_ready(&mut self) -> bool {
        self.format.is_some()
    }

    fn begin_streaming(&mut self) -> Result<(), ConfigError> {
        if self.format.is_none() {
            return Err(ConfigError::not_ready("delay line is not configured"));
        }
        self.streaming = true;
        self.ended = false;
        Ok(())
    }

    fn start_of_stream(&mut self) -> Result<(), ConfigError> {
        if !self.streaming {
            return Err(ConfigError::Notification(
                "start of stream before begin streaming".into(),
            ));
        }
        Ok(())
    }

    fn end_of_stream(&mut self) -> Result<(), ConfigError> {
        self.ended = true;
        self.released.extend(self.held.drain(..));
        Ok(())
    }

    fn submit(&mut self, input: &InputUnit) -> Result<(), SubmitError> {
        if !self.streaming {
            return Err(SubmitError::Rejected(E_UNEXPECTED));
        }
        if self.ended {
            return Err(SubmitError::Rejected(E_NOT_ACCEPTING));
        }
        // Output from the previous frame must be drained first.
        if !self.released.is_empty() {
            return Err(SubmitError::Busy);
        }

        let data = input.data().map_err(|_| SubmitError::Rejected(E_INVALID_ARG))?;
        if data.len() > self.frame_size {
            return Err(SubmitError::Rejected(E_INVALID_ARG));
        }

        self.held.push_back(data.to_vec());
        while self.held.len() > self.delay {
            if let Some(frame) = self.held.pop_front() {
                self.released.push_back(frame);
            }
        }
        Ok(())
    }

    fn query_output_requirements(&mut self) -> OutputRequirements {
        OutputRequirements {
            min_buffer_size: self.frame_size,
            provides_own_buffers: false,
        }
    }

    fn drain_one(&mut self, buffer: Option<Buffer>) -> TransformStatus {
        let Some(frame) = self.released.front() else {
            return TransformStatus::NeedsMoreInput;
        };
        let Some(mut buffer) = buffer else {
            return TransformStatus::Failed(E_INVALID_ARG);
        };
        if frame.len() > buffer.capacity() {
            return TransformStatus::Failed(E_BUFFER_TOO_SMALL);
        }
        if buffer.fill(frame).is_err() {
            return TransformStatus::Failed(E_UNEXPECTED);
        }

        self.released.pop_front();
        TransformStatus::Produced(OutputUnit::single(buffer))
    }
}
