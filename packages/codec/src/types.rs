//! Core types for stream configuration.

use std::time::Duration;

use crate::frame::TICKS_PER_SECOND;
use crate::{expected_frame_size, ConfigError};

/// Media subtype carried on one side of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSubtype {
    /// NV12 (YUV 4:2:0, planar Y + interleaved UV).
    Nv12,
    /// I420/YUV420P (YUV 4:2:0, planar Y + U + V).
    I420,
    /// YUY2 (YUV 4:2:2, packed).
    Yuy2,
    /// 32-bit RGB (8 bits per channel plus padding).
    Rgb32,
    /// H.264/AVC elementary stream.
    H264,
    /// H.265/HEVC elementary stream.
    Hevc,
}

impl MediaSubtype {
    /// Returns true for compressed (codec-native) subtypes.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::H264 | Self::Hevc)
    }

    /// Returns true for chroma-subsampled 4:2:0 subtypes, which need even
    /// frame dimensions.
    #[must_use]
    pub fn is_420(&self) -> bool {
        matches!(self, Self::Nv12 | Self::I420)
    }
}

impl Default for MediaSubtype {
    fn default() -> Self {
        Self::Nv12
    }
}

/// H.264 profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    Baseline,
    Main,
    High,
}

impl Default for Profile {
    fn default() -> Self {
        Self::Main
    }
}

/// Format descriptor for one side of a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFormat {
    /// Media subtype.
    pub subtype: MediaSubtype,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate as (numerator, denominator).
    pub frame_rate: (u32, u32),
    /// Average bitrate in bits per second (compressed subtypes only).
    pub bitrate: Option<u32>,
    /// Codec profile (compressed subtypes only).
    pub profile: Option<Profile>,
    /// Codec level, e.g. 41 for level 4.1 (compressed subtypes only).
    pub level: Option<u32>,
}

impl MediaFormat {
    /// Size in bytes of one uncompressed frame, if the subtype is raw.
    #[must_use]
    pub fn frame_size(&self) -> Option<usize> {
        expected_frame_size(self.width, self.height, self.subtype)
    }
}

/// Stream configuration committed by the session at `initialize()` time.
///
/// Immutable once committed; changing it requires a full shutdown and
/// re-initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Subtype of the raw frames fed into the transform.
    pub input_subtype: MediaSubtype,
    /// Subtype produced by the transform.
    pub output_subtype: MediaSubtype,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Framerate as (numerator, denominator).
    pub frame_rate: (u32, u32),
    /// Target bitrate in bits per second.
    pub bitrate: u32,
    /// Codec profile.
    pub profile: Profile,
    /// Codec level (e.g. 41 for 4.1).
    pub level: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            input_subtype: MediaSubtype::Nv12,
            output_subtype: MediaSubtype::H264,
            width: 640,
            height: 480,
            frame_rate: (30, 1),
            bitrate: 1_500_000, // 1.5 Mbps
            profile: Profile::Main,
            level: 41,
        }
    }
}

impl StreamConfig {
    /// Create a new stream configuration with the given dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the input subtype.
    #[must_use]
    pub fn input_subtype(mut self, subtype: MediaSubtype) -> Self {
        self.input_subtype = subtype;
        self
    }

    /// Set the output subtype.
    #[must_use]
    pub fn output_subtype(mut self, subtype: MediaSubtype) -> Self {
        self.output_subtype = subtype;
        self
    }

    /// Set the framerate.
    #[must_use]
    pub fn framerate(mut self, num: u32, den: u32) -> Self {
        self.frame_rate = (num, den);
        self
    }

    /// Set the target bitrate in bits per second.
    #[must_use]
    pub fn bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Set the codec profile.
    #[must_use]
    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the codec level.
    #[must_use]
    pub fn level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Check that the configuration describes a usable stream.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        let needs_even = self.input_subtype.is_420() || self.output_subtype.is_420();
        if needs_even && (self.width % 2 != 0 || self.height % 2 != 0) {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        let (num, den) = self.frame_rate;
        if num == 0 || den == 0 {
            return Err(ConfigError::invalid(format!(
                "frame rate {}/{} must have a non-zero numerator and denominator",
                num, den
            )));
        }

        if self.output_subtype.is_compressed() {
            if self.bitrate == 0 {
                return Err(ConfigError::invalid(
                    "bitrate must be non-zero for compressed output",
                ));
            }
            if self.level == 0 {
                return Err(ConfigError::invalid(
                    "level must be non-zero for compressed output",
                ));
            }
        }

        Ok(())
    }

    /// Format descriptor for the transform input.
    #[must_use]
    pub fn input_format(&self) -> MediaFormat {
        self.format_for(self.input_subtype)
    }

    /// Format descriptor for the transform output.
    #[must_use]
    pub fn output_format(&self) -> MediaFormat {
        self.format_for(self.output_subtype)
    }

    fn format_for(&self, subtype: MediaSubtype) -> MediaFormat {
        let compressed = subtype.is_compressed();
        MediaFormat {
            subtype,
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
            bitrate: compressed.then_some(self.bitrate),
            profile: compressed.then_some(self.profile),
            level: compressed.then_some(self.level),
        }
    }

    /// Duration of one frame in 100-nanosecond ticks (30/1 gives 333_333).
    #[must_use]
    pub fn frame_duration(&self) -> u64 {
        let (num, den) = self.frame_rate;
        if num == 0 {
            return 0;
        }
        TICKS_PER_SECOND * u64::from(den) / u64::from(num)
    }

    /// Size in bytes of one raw input frame, if the input subtype is raw.
    #[must_use]
    pub fn input_frame_size(&self) -> Option<usize> {
        expected_frame_size(self.width, self.height, self.input_subtype)
    }
}

/// Policy knobs for the frame pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpOptions {
    /// Maximum number of submit attempts per frame before `Saturated`.
    pub max_submit_attempts: u32,
    /// Base sleep between attempts; attempt `n` sleeps `n * retry_backoff`.
    pub retry_backoff: Duration,
    /// Forward non-empty payloads to the registered sink.
    pub forward_to_sink: bool,
    /// Minimum accepted frame length in bytes. 0 accepts empty frames.
    pub min_frame_len: usize,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            max_submit_attempts: 3,
            retry_backoff: Duration::from_millis(1),
            forward_to_sink: true,
            min_frame_len: 0,
        }
    }
}

impl PumpOptions {
    /// Set the submit attempt cap.
    #[must_use]
    pub fn max_submit_attempts(mut self, attempts: u32) -> Self {
        self.max_submit_attempts = attempts;
        self
    }

    /// Set the base retry backoff.
    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Enable or disable forwarding to the sink.
    #[must_use]
    pub fn forward_to_sink(mut self, forward: bool) -> Self {
        self.forward_to_sink = forward;
        self
    }

    /// Set an explicit minimum frame length.
    #[must_use]
    pub fn min_frame_len(mut self, len: usize) -> Self {
        self.min_frame_len = len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_stream() {
        let config = StreamConfig::default();
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.frame_rate, (30, 1));
        assert_eq!(config.bitrate, 1_500_000);
        assert_eq!(config.input_subtype, MediaSubtype::Nv12);
        assert_eq!(config.output_subtype, MediaSubtype::H264);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_duration() {
        assert_eq!(StreamConfig::default().frame_duration(), 333_333);
        assert_eq!(StreamConfig::default().framerate(25, 1).frame_duration(), 400_000);
        assert_eq!(
            StreamConfig::default().framerate(30_000, 1001).frame_duration(),
            333_666
        );
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        assert!(matches!(
            StreamConfig::new(0, 480).validate(),
            Err(ConfigError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            StreamConfig::new(641, 480).validate(),
            Err(ConfigError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            StreamConfig::default().framerate(30, 0).validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
        assert!(matches!(
            StreamConfig::default().bitrate(0).validate(),
            Err(ConfigError::InvalidConfig(_))
        ));

        // Odd sizes are fine when nothing is 4:2:0, and raw output needs no bitrate.
        let raw = StreamConfig::new(641, 481)
            .input_subtype(MediaSubtype::Rgb32)
            .output_subtype(MediaSubtype::Rgb32)
            .bitrate(0);
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_formats() {
        let config = StreamConfig::default();
        let input = config.input_format();
        assert_eq!(input.subtype, MediaSubtype::Nv12);
        assert_eq!(input.bitrate, None);
        assert_eq!(input.frame_size(), Some(640 * 480 * 3 / 2));

        let output = config.output_format();
        assert_eq!(output.subtype, MediaSubtype::H264);
        assert_eq!(output.bitrate, Some(1_500_000));
        assert_eq!(output.profile, Some(Profile::Main));
        assert_eq!(output.level, Some(41));
        assert_eq!(output.frame_size(), None);
    }
}
