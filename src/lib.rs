//! framepump - drive push-style media transforms frame by frame.
//!
//! The codec-agnostic core lives in [`framepump_codec`] and is re-exported
//! here as [`codec`]. This crate adds the pieces around it:
//!
//! - [`sink::FileSink`]: write payloads to a file, unframed
//! - [`sink::BackgroundSink`]: move sink I/O off the pump thread
//! - [`source::RawFileSource`]: read fixed-size raw frames from a file
//!
//! # Example
//!
//! ```ignore
//! use framepump::codec::{software::DelayLine, PumpOptions, StreamConfig, TransformSession};
//! use framepump::sink::FileSink;
//! use framepump::source::RawFileSource;
//!
//! let config = StreamConfig::new(640, 480)
//!     .input_subtype(MediaSubtype::Nv12)
//!     .output_subtype(MediaSubtype::Nv12);
//!
//! let session = TransformSession::new(|| Ok(DelayLine::new(2)), PumpOptions::default());
//! session.initialize(config.clone())?;
//! session.set_sink(FileSink::create("out.yuv")?);
//! session.start()?;
//!
//! let mut source = RawFileSource::open("in.yuv", &config)?;
//! while let Some(frame) = source.next_frame()? {
//!     session.process_frame(&frame)?;
//! }
//! session.flush()?;
//! session.shutdown();
//! ```

pub mod sink;
pub mod source;

pub use framepump_codec as codec;

pub use sink::{BackgroundSink, FileSink};
pub use source::{RawFileSource, RawFrameSource};

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::software::DelayLine;
    use crate::codec::{LifecycleState, MediaSubtype, PumpOptions, StreamConfig, TransformSession};

    fn passthrough(width: u32, height: u32) -> StreamConfig {
        StreamConfig::new(width, height)
            .input_subtype(MediaSubtype::Nv12)
            .output_subtype(MediaSubtype::Nv12)
    }

    fn input_frames(count: u8, frame_size: usize) -> Vec<u8> {
        (0..count)
            .flat_map(|i| std::iter::repeat(i).take(frame_size))
            .collect()
    }

    fn run(
        session: &TransformSession<DelayLine>,
        config: &StreamConfig,
        input: Vec<u8>,
    ) -> anyhow::Result<()> {
        let mut source = RawFrameSource::from_config(Cursor::new(input), config)?;
        session.start()?;
        while let Some(frame) = source.next_frame()? {
            session.process_frame(&frame)?;
        }
        session.flush()?;
        session.shutdown();
        Ok(())
    }

    #[test]
    fn test_file_round_trip_through_delay_line() {
        let config = passthrough(8, 4);
        let input = input_frames(6, 48);
        let path = std::env::temp_dir().join(format!("framepump-{}-e2e.yuv", std::process::id()));

        let session = TransformSession::new(|| Ok(DelayLine::new(3)), PumpOptions::default());
        session.initialize(config.clone()).unwrap();
        session.set_sink(FileSink::create(&path).unwrap());
        run(&session, &config, input.clone()).unwrap();

        assert_eq!(session.state(), LifecycleState::Stopped);
        let stats = session.stats();
        assert_eq!(stats.frames_submitted, 6);
        assert_eq!(stats.frames_with_output, 4);
        assert_eq!(stats.units_produced, 6);

        assert_eq!(std::fs::read(&path).unwrap(), input);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_background_writer_round_trip() {
        let config = passthrough(8, 4);
        let input = input_frames(10, 48);
        let path = std::env::temp_dir().join(format!("framepump-{}-bg.yuv", std::process::id()));

        let session = TransformSession::new(|| Ok(DelayLine::new(1)), PumpOptions::default());
        session.initialize(config.clone()).unwrap();
        session.set_sink(BackgroundSink::new(FileSink::create(&path).unwrap(), 2).unwrap());

        let expected = input.clone();
        tokio::task::spawn_blocking(move || run(&session, &config, input))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), expected);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_session_with_background_writer_dropped_in_async_code() {
        let path = std::env::temp_dir().join(format!("framepump-{}-bg-drop.yuv", std::process::id()));

        let session = TransformSession::new(|| Ok(DelayLine::new(0)), PumpOptions::default());
        session.initialize(passthrough(8, 4)).unwrap();
        session.set_sink(BackgroundSink::new(FileSink::create(&path).unwrap(), 2).unwrap());
        drop(session);

        std::fs::remove_file(&path).ok();
    }
}
