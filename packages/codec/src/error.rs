//! Error types for the frame pump and its collaborators.

use thiserror::Error;

use crate::LifecycleState;

/// Errors raised by [`Buffer`](crate::Buffer) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// `lock_for_write` was called twice without an intervening `unlock`.
    #[error("buffer is already locked for writing")]
    AlreadyLocked,

    /// A write would run past the end of the buffer.
    #[error("write of {len} bytes at offset {offset} exceeds capacity {capacity}")]
    Overflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// `write` or `set_used_length` was called without holding the write lock.
    #[error("buffer is not locked for writing")]
    NotLocked,

    /// The used length is larger than the capacity.
    #[error("used length {len} exceeds capacity {capacity}")]
    InvalidLength { len: usize, capacity: usize },

    /// The buffer is still write-locked or was never populated.
    #[error("buffer is not readable")]
    NotReadable,
}

/// Errors raised while creating, configuring or notifying a transform.
///
/// All of these are fatal to `initialize()` but recoverable by retrying with
/// a different [`StreamConfig`](crate::StreamConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The transform cannot support the requested input/output pairing.
    #[error("format rejected: {0}")]
    FormatRejected(String),

    /// The operation is not valid in the current state.
    #[error("not ready: {0}")]
    NotReady(String),

    /// The transform handle could not be created.
    #[error("failed to create transform: {0}")]
    HandleCreation(String),

    /// The stream configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid frame dimensions.
    #[error("invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The transform was configured but does not report that it accepts input.
    #[error("transform does not accept input after configuration")]
    InputNotAccepted,

    /// A streaming notification was refused by the transform.
    #[error("stream notification failed: {0}")]
    Notification(String),
}

impl ConfigError {
    /// Create a FormatRejected error with a message.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::FormatRejected(msg.into())
    }

    /// Create a NotReady error with a message.
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// Create an InvalidConfig error with a message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Errors returned by [`TransformHandle::submit`](crate::TransformHandle::submit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The transform cannot take input right now. Transient.
    #[error("transform is busy")]
    Busy,

    /// The transform refused the input. Fatal for this stream.
    #[error("transform rejected input (code {0:#x})")]
    Rejected(i32),
}

/// Errors raised by a downstream [`Sink`](crate::Sink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// Underlying I/O failure.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink was already closed.
    #[error("sink is closed")]
    Closed,

    /// Any other sink failure.
    #[error("sink error: {0}")]
    Other(String),
}

/// Errors returned by [`FramePump::process_frame`](crate::FramePump::process_frame)
/// and the session operations built on it.
///
/// Legitimately empty output is always `Ok` with an empty payload; every
/// failure is reported here, never swallowed into an empty success.
#[derive(Debug, Error)]
pub enum PumpError {
    /// The transform rejected the input unit. The stream must be torn down
    /// and reconfigured.
    #[error("transform rejected input (code {code:#x}); stream must be reconfigured")]
    SubmitRejected { code: i32 },

    /// The transform reported a fatal error while draining. Partial output
    /// for the cycle has been discarded.
    #[error("transform failed while draining (code {0:#x})")]
    DrainFailed(i32),

    /// The transform stayed busy for every submit attempt. Transient; the
    /// frame was not submitted and may be retried or dropped.
    ///
    /// `pending` holds output drained while waiting for the transform, which
    /// belongs to earlier frames and must not be lost.
    #[error("transform saturated after {attempts} submit attempts")]
    Saturated { attempts: u32, pending: Vec<u8> },

    /// The transform signalled a format change while the pump was draining
    /// to make room for this frame. Transient; the frame was not submitted.
    ///
    /// `pending` holds the output drained before the change.
    #[error("output format changed before the frame could be submitted")]
    Interrupted { pending: Vec<u8> },

    /// The frame is shorter than the explicitly configured minimum length.
    #[error("frame length {len} is below the configured minimum {min}")]
    InvalidLength { len: usize, min: usize },

    /// The session is not in the `Streaming` state.
    #[error("session is not streaming (state: {0:?})")]
    NotStreaming(LifecycleState),

    /// Buffer handling failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// A stream notification failed (e.g. end of stream during flush).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Forwarding the payload to the sink failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl PumpError {
    /// Returns true if the error is transient and the same frame may be
    /// submitted again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Saturated { .. } | Self::Interrupted { .. })
    }

    /// Output drained before the error, if the error carries any.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        match self {
            Self::Saturated { pending, .. } | Self::Interrupted { pending } => pending,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let saturated = PumpError::Saturated {
            attempts: 3,
            pending: vec![1, 2],
        };
        assert!(saturated.is_transient());
        assert_eq!(saturated.pending(), &[1, 2]);

        assert!(!PumpError::DrainFailed(-5).is_transient());
        assert!(!PumpError::SubmitRejected { code: 1 }.is_transient());
        assert!(PumpError::DrainFailed(-5).pending().is_empty());
    }

    #[test]
    fn test_messages() {
        let err = BufferError::Overflow {
            offset: 4,
            len: 8,
            capacity: 10,
        };
        assert_eq!(
            err.to_string(),
            "write of 8 bytes at offset 4 exceeds capacity 10"
        );
        assert_eq!(
            ConfigError::rejected("nv12 -> mjpg").to_string(),
            "format rejected: nv12 -> mjpg"
        );
    }
}
