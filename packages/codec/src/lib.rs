//! Codec-agnostic frame pump for block-based media transforms.
//!
//! This crate drives a push-style transform (an encoder, decoder or filter
//! that takes input units and emits output units at its own pace) one frame
//! at a time: every raw frame is copied into an input unit, submitted, and the
//! transform is drained until it asks for more input. The output of each
//! cycle is returned as one concatenated payload and optionally forwarded to
//! a sink.
//!
//! Platform codecs plug in by implementing [`TransformHandle`]. A software
//! passthrough ([`software::DelayLine`]) is included for testing pipelines on
//! any machine.
//!
//! # Quick Start
//!
//! ```ignore
//! use framepump_codec::{PumpOptions, RawFrame, StreamConfig, TransformSession};
//!
//! let session = TransformSession::new(|| PlatformEncoder::create(), PumpOptions::default());
//!
//! // 640x480 NV12 to H.264, 30 fps, 1.5 Mbps
//! session.initialize(StreamConfig::new(640, 480).bitrate(1_500_000))?;
//! session.start()?;
//!
//! let payload = session.process_frame(&RawFrame::new(&nv12, timestamp))?;
//! // payload.data holds zero or more Annex B access units
//!
//! let tail = session.flush()?;
//! session.shutdown();
//! ```
//!
//! # Architecture
//!
//! - [`Buffer`]: byte region with lock/unlock write access and a used length.
//! - [`TransformHandle`]: the adapter seam over a concrete codec.
//! - [`drain_output`]: exhaustive drain loop with format-change handling.
//! - [`FramePump`]: submit with bounded retry, drain, forward.
//! - [`TransformSession`]: lifecycle, sink ownership and serialization.

pub mod annexb;
mod buffer;
mod drain;
mod error;
mod frame;
mod pump;
mod session;
pub mod software;
mod traits;
mod types;

#[cfg(test)]
mod testing;

pub use buffer::Buffer;
pub use drain::{drain_output, DrainOutcome, RequirementsCache};
pub use error::{BufferError, ConfigError, PumpError, SinkError, SubmitError};
pub use frame::{expected_frame_size, InputUnit, OutputUnit, RawFrame, TICKS_PER_SECOND};
pub use pump::{EncodedPayload, FramePump, SessionStats};
pub use session::{LifecycleState, TransformSession};
pub use traits::{OutputRequirements, Sink, TransformHandle, TransformStatus};
pub use types::{MediaFormat, MediaSubtype, Profile, PumpOptions, StreamConfig};
