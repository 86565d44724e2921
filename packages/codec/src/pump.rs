//! Frame pump: submit one raw frame, drain everything it produced.

use std::time::{Duration, Instant};

use crate::drain::{drain_output, RequirementsCache};
use crate::{
    InputUnit, PumpError, PumpOptions, RawFrame, Sink, SubmitError, TransformHandle,
};

/// Aggregated output of one pump cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedPayload {
    /// In-order concatenation of every produced output unit.
    pub data: Vec<u8>,
    /// Number of output units aggregated into `data`.
    pub units: usize,
    /// True if the cycle was cut short by a format change. `data` then only
    /// holds output from before the change.
    pub format_changed: bool,
    /// Wall-clock time spent in the cycle. Informational only.
    pub elapsed: Duration,
}

impl EncodedPayload {
    /// Returns true if the cycle legitimately produced no output.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Take the payload bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Running counters for a pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames accepted by the transform.
    pub frames_submitted: u64,
    /// Cycles that produced at least one byte.
    pub frames_with_output: u64,
    /// Output units produced.
    pub units_produced: u64,
    /// Payload bytes produced.
    pub bytes_produced: u64,
    /// `FormatChanged` statuses seen.
    pub format_changes: u64,
    /// Submit attempts that found the transform busy or not ready.
    pub busy_retries: u64,
}

/// Drives one transform: wraps frames into input units, submits them with
/// bounded retry, and drains all output per frame.
///
/// At most one input unit is outstanding at a time; `&mut self` on every
/// operation enforces that within a thread, and
/// [`TransformSession`](crate::TransformSession) serializes callers across
/// threads.
pub struct FramePump<T> {
    transform: T,
    options: PumpOptions,
    default_duration: u64,
    requirements: RequirementsCache,
    stats: SessionStats,
}

impl<T: TransformHandle> FramePump<T> {
    /// Create a pump over a configured transform.
    ///
    /// `default_duration` (in ticks) is used for frames that carry none.
    pub fn new(transform: T, default_duration: u64, options: PumpOptions) -> Self {
        Self {
            transform,
            options,
            default_duration,
            requirements: RequirementsCache::new(),
            stats: SessionStats::default(),
        }
    }

    /// The underlying transform.
    pub fn transform(&self) -> &T {
        &self.transform
    }

    /// The underlying transform, mutably.
    pub fn transform_mut(&mut self) -> &mut T {
        &mut self.transform
    }

    /// Pump options in effect.
    pub fn options(&self) -> &PumpOptions {
        &self.options
    }

    /// Counters since the pump was created.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Release the transform.
    pub fn into_transform(self) -> T {
        self.transform
    }

    /// Submit one frame and drain every output unit it produced.
    ///
    /// The frame bytes are copied; `raw` is not referenced after return.
    /// When `sink` is given and forwarding is enabled, a non-empty payload
    /// is handed to it before returning.
    ///
    /// # Errors
    ///
    /// - `InvalidLength` if the frame is shorter than `min_frame_len`
    /// - `SubmitRejected` if the transform refuses the input (fatal)
    /// - `Saturated` if the transform stayed busy for every attempt
    /// - `Interrupted` if the format changed while making room for the frame
    /// - `DrainFailed` if the transform fails while draining (fatal)
    pub fn process_frame(
        &mut self,
        raw: &RawFrame<'_>,
        sink: Option<&mut dyn Sink>,
    ) -> Result<EncodedPayload, PumpError> {
        let start = Instant::now();

        if raw.len() < self.options.min_frame_len {
            return Err(PumpError::InvalidLength {
                len: raw.len(),
                min: self.options.min_frame_len,
            });
        }

        let input = InputUnit::from_frame(raw, self.default_duration)?;

        // A previous format change must be acknowledged before submitting.
        if self.requirements.is_stale() {
            self.requirements.refresh(&mut self.transform);
        }

        let duration = raw.duration.unwrap_or(self.default_duration);
        let mut payload = EncodedPayload::default();
        if let Err(err) = self.submit_with_retry(&input, &mut payload) {
            self.deliver_pending(duration, payload.units, &err, sink);
            return Err(err);
        }
        self.stats.frames_submitted += 1;
        drop(input);

        let outcome = drain_output(&mut self.transform, &mut self.requirements)?;
        payload.data.extend_from_slice(&outcome.data);
        payload.units += outcome.units;
        payload.format_changed = outcome.format_changed;
        if outcome.format_changed {
            self.stats.format_changes += 1;
        }

        self.finish_cycle(&mut payload, start);
        tracing::debug!(
            timestamp = raw.timestamp,
            input_bytes = raw.len(),
            output_bytes = payload.len(),
            units = payload.units,
            elapsed_ms = payload.elapsed.as_secs_f64() * 1000.0,
            "Frame processed"
        );

        self.forward(duration, &payload.data, sink)?;
        Ok(payload)
    }

    /// Drain whatever the transform still holds, e.g. after `end_of_stream`.
    pub fn drain_remaining(
        &mut self,
        sink: Option<&mut dyn Sink>,
    ) -> Result<EncodedPayload, PumpError> {
        let start = Instant::now();

        let outcome = drain_output(&mut self.transform, &mut self.requirements)?;
        let mut payload = EncodedPayload {
            data: outcome.data,
            units: outcome.units,
            format_changed: outcome.format_changed,
            elapsed: Duration::ZERO,
        };
        if payload.format_changed {
            self.stats.format_changes += 1;
        }
        self.finish_cycle(&mut payload, start);

        self.forward(self.default_duration, &payload.data, sink)?;
        Ok(payload)
    }

    /// Submit `input`, retrying while the transform is not ready or busy.
    ///
    /// A busy transform is drained before the next attempt; that output
    /// belongs to earlier frames and is appended to `payload`.
    fn submit_with_retry(
        &mut self,
        input: &InputUnit,
        payload: &mut EncodedPayload,
    ) -> Result<(), PumpError> {
        let attempts = self.options.max_submit_attempts.max(1);

        for attempt in 1..=attempts {
            if !self.transform.input_ready() {
                self.stats.busy_retries += 1;
                tracing::debug!(attempt, attempts, "Transform not accepting input");
                self.backoff(attempt, attempts);
                continue;
            }

            match self.transform.submit(input) {
                Ok(()) => return Ok(()),
                Err(SubmitError::Busy) => {
                    self.stats.busy_retries += 1;
                    tracing::debug!(attempt, attempts, "Transform busy, draining before retry");

                    let outcome = drain_output(&mut self.transform, &mut self.requirements)?;
                    payload.data.extend_from_slice(&outcome.data);
                    payload.units += outcome.units;
                    if outcome.format_changed {
                        self.stats.format_changes += 1;
                        return Err(PumpError::Interrupted {
                            pending: std::mem::take(&mut payload.data),
                        });
                    }
                    self.backoff(attempt, attempts);
                }
                Err(SubmitError::Rejected(code)) => {
                    tracing::error!(code, "Transform rejected input");
                    return Err(PumpError::SubmitRejected { code });
                }
            }
        }

        tracing::warn!(attempts, "Transform saturated, frame not submitted");
        Err(PumpError::Saturated {
            attempts,
            pending: std::mem::take(&mut payload.data),
        })
    }

    fn backoff(&self, attempt: u32, attempts: u32) {
        if attempt < attempts && !self.options.retry_backoff.is_zero() {
            std::thread::sleep(self.options.retry_backoff * attempt);
        }
    }

    fn finish_cycle(&mut self, payload: &mut EncodedPayload, start: Instant) {
        payload.elapsed = start.elapsed();
        self.stats.units_produced += payload.units as u64;
        self.stats.bytes_produced += payload.data.len() as u64;
        if !payload.is_empty() {
            self.stats.frames_with_output += 1;
        }
    }

    fn forward(
        &self,
        duration: u64,
        data: &[u8],
        sink: Option<&mut dyn Sink>,
    ) -> Result<(), PumpError> {
        if !self.options.forward_to_sink || data.is_empty() {
            return Ok(());
        }
        if let Some(sink) = sink {
            sink.accept(duration, data)?;
        }
        Ok(())
    }

    /// Output drained while the frame could not be submitted belongs to
    /// earlier frames: count it and hand it to the sink. The bytes stay in
    /// the error for callers without a sink.
    fn deliver_pending(
        &mut self,
        duration: u64,
        units: usize,
        err: &PumpError,
        sink: Option<&mut dyn Sink>,
    ) {
        let pending = err.pending();
        self.stats.units_produced += units as u64;
        self.stats.bytes_produced += pending.len() as u64;
        if pending.is_empty() {
            return;
        }
        self.stats.frames_with_output += 1;
        if let Err(e) = self.forward(duration, pending, sink) {
            tracing::error!(bytes = pending.len(), "Failed to forward pending output: {}", e);
        }
    }
}
