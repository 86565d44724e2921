//! Interfaces the pump drives: the block transform and the downstream sink.

use crate::{Buffer, ConfigError, InputUnit, MediaFormat, OutputUnit, SinkError, SubmitError};

/// Output buffer requirements reported by a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputRequirements {
    /// Minimum size of a pump-allocated output buffer.
    pub min_buffer_size: usize,
    /// True if the transform allocates its own output buffers.
    pub provides_own_buffers: bool,
}

/// Result of a single drain attempt.
#[derive(Debug)]
pub enum TransformStatus {
    /// One output unit was produced. More may follow for the same input.
    Produced(OutputUnit),
    /// The transform has nothing more for the current input.
    NeedsMoreInput,
    /// The output format or buffer requirements changed and must be
    /// re-queried before the next drain.
    FormatChanged,
    /// Fatal transform error.
    Failed(i32),
}

/// Handle to a push-style block transform (encoder, decoder or filter).
///
/// The handle accepts one input unit at a time and yields zero, one or many
/// output units per input. It owns no pump-level state; the pump decides
/// when to poll, submit, re-query requirements and drain.
///
/// # Example
///
/// ```ignore
/// use framepump_codec::{TransformHandle, TransformStatus};
///
/// transform.configure(&config.input_format(), &config.output_format())?;
/// transform.begin_streaming()?;
/// transform.start_of_stream()?;
///
/// transform.submit(&input)?;
/// loop {
///     match transform.drain_one(None) {
///         TransformStatus::Produced(unit) => { /* consume */ }
///         _ => break,
///     }
/// }
/// ```
pub trait TransformHandle: Send {
    /// Set the input and output formats.
    ///
    /// Fails with `FormatRejected` for unsupported pairings and `NotReady`
    /// once streaming has begun.
    fn configure(&mut self, input: &MediaFormat, output: &MediaFormat)
        -> Result<(), ConfigError>;

    /// True iff the transform currently accepts a new input unit.
    ///
    /// `false` is transient; callers poll with a bounded backoff.
    fn input_ready(&mut self) -> bool;

    /// Notify the transform that streaming is about to begin. Idempotent.
    fn begin_streaming(&mut self) -> Result<(), ConfigError>;

    /// Notify the transform that a new stream starts. Idempotent until the
    /// next `end_of_stream`.
    fn start_of_stream(&mut self) -> Result<(), ConfigError>;

    /// Notify the transform that no more input follows, so it releases any
    /// output it is holding back.
    fn end_of_stream(&mut self) -> Result<(), ConfigError>;

    /// Submit one input unit. The transform must not keep the reference.
    fn submit(&mut self, input: &InputUnit) -> Result<(), SubmitError>;

    /// Current output buffer requirements.
    fn query_output_requirements(&mut self) -> OutputRequirements;

    /// Try to produce one output unit.
    ///
    /// `buffer` is a pump-allocated buffer of at least `min_buffer_size`
    /// bytes when the transform does not provide its own, `None` otherwise.
    fn drain_one(&mut self, buffer: Option<Buffer>) -> TransformStatus;
}

impl<T: TransformHandle + ?Sized> TransformHandle for Box<T> {
    fn configure(
        &mut self,
        input: &MediaFormat,
        output: &MediaFormat,
    ) -> Result<(), ConfigError> {
        (**self).configure(input, output)
    }

    fn input_ready(&mut self) -> bool {
        (**self).input_ready()
    }

    fn begin_streaming(&mut self) -> Result<(), ConfigError> {
        (**self).begin_streaming()
    }

    fn start_of_stream(&mut self) -> Result<(), ConfigError> {
        (**self).start_of_stream()
    }

    fn end_of_stream(&mut self) -> Result<(), ConfigError> {
        (**self).end_of_stream()
    }

    fn submit(&mut self, input: &InputUnit) -> Result<(), SubmitError> {
        (**self).submit(input)
    }

    fn query_output_requirements(&mut self) -> OutputRequirements {
        (**self).query_output_requirements()
    }

    fn drain_one(&mut self, buffer: Option<Buffer>) -> TransformStatus {
        (**self).drain_one(buffer)
    }
}

/// Downstream consumer of encoded payloads.
///
/// Called at most once per processed frame, and only with non-empty
/// payloads. Any container framing is the sink's job.
///
/// A sink dropped without `close` should still release its resources;
/// [`TransformSession`](crate::TransformSession) only calls `close` from
/// `shutdown`.
pub trait Sink: Send {
    /// Accept one payload. `duration_hint` is the frame duration in ticks.
    fn accept(&mut self, duration_hint: u64, payload: &[u8]) -> Result<(), SinkError>;

    /// Flush and release the sink. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
