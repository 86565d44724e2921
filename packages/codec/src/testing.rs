//! Scripted transform and recording sink for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::software::E_BUFFER_TOO_SMALL;
use crate::{
    Buffer, ConfigError, InputUnit, MediaFormat, OutputRequirements, OutputUnit, Sink, SinkError,
    SubmitError, TransformHandle, TransformStatus,
};

/// One scripted drain result.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Produce one output unit made of these buffers.
    Produce(Vec<Vec<u8>>),
    NeedMore,
    FormatChange,
    Fail(i32),
}

impl Step {
    pub(crate) fn produce(bytes: &[u8]) -> Self {
        Step::Produce(vec![bytes.to_vec()])
    }
}

/// Everything the scripted transform observed.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog {
    pub configure_calls: usize,
    pub begin_streaming: usize,
    pub start_of_stream: usize,
    pub end_of_stream: usize,
    pub submit_attempts: usize,
    /// (timestamp, duration, bytes) of each accepted input.
    pub submitted: Vec<(u64, u64, Vec<u8>)>,
    pub input_polls: usize,
    pub drain_calls: usize,
    pub requirement_queries: usize,
    pub buffers_received: usize,
    pub min_capacity_received: Option<usize>,
    pub stale_drain: bool,
    pub dropped: bool,
}

/// Transform test double driven by a queue of drain results.
///
/// Panics if `drain_one` is called while the output requirements are stale
/// after a format change, or if a second input is submitted before the
/// previous one was drained to a terminal status.
pub(crate) struct ScriptedTransform {
    script: VecDeque<Step>,
    requirements: OutputRequirements,
    busy: usize,
    not_ready: usize,
    reject: Option<i32>,
    reject_formats: bool,
    streaming: bool,
    stale: bool,
    outstanding: bool,
    log: Arc<Mutex<CallLog>>,
}

impl ScriptedTransform {
    pub(crate) fn new() -> Self {
        Self {
            script: VecDeque::new(),
            requirements: OutputRequirements {
                min_buffer_size: 0,
                provides_own_buffers: true,
            },
            busy: 0,
            not_ready: 0,
            reject: None,
            reject_formats: false,
            streaming: false,
            stale: false,
            outstanding: false,
            log: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    pub(crate) fn with_script(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.script.extend(steps);
        self
    }

    pub(crate) fn with_requirements(mut self, requirements: OutputRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Answer `Busy` to the next `count` submissions.
    pub(crate) fn with_busy(mut self, count: usize) -> Self {
        self.busy = count;
        self
    }

    /// Answer `false` to the next `count` readiness polls.
    pub(crate) fn with_not_ready(mut self, count: usize) -> Self {
        self.not_ready = count;
        self
    }

    pub(crate) fn with_reject(mut self, code: i32) -> Self {
        self.reject = Some(code);
        self
    }

    pub(crate) fn rejecting_formats(mut self) -> Self {
        self.reject_formats = true;
        self
    }

    /// Shared call log, still readable after the transform is moved.
    pub(crate) fn log_handle(&self) -> Arc<Mutex<CallLog>> {
        self.log.clone()
    }

    pub(crate) fn log(&self) -> CallLog {
        self.lock_log().clone()
    }

    pub(crate) fn remaining_steps(&self) -> usize {
        self.script.len()
    }

    fn lock_log(&self) -> MutexGuard<'_, CallLog> {
        self.log.lock().unwrap()
    }
}

impl TransformHandle for ScriptedTransform {
    fn configure(&mut self, _input: &MediaFormat, _output: &MediaFormat) -> Result<(), ConfigError> {
        self.lock_log().configure_calls += 1;
        if self.streaming {
            return Err(ConfigError::not_ready("already streaming"));
        }
        if self.reject_formats {
            return Err(ConfigError::rejected("scripted rejection"));
        }
        Ok(())
    }

    fn input_ready(&mut self) -> bool {
        self.lock_log().input_polls += 1;
        if self.not_ready > 0 {
            self.not_ready -= 1;
            return false;
        }
        true
    }

    fn begin_streaming(&mut self) -> Result<(), ConfigError> {
        self.lock_log().begin_streaming += 1;
        self.streaming = true;
        Ok(())
    }

    fn start_of_stream(&mut self) -> Result<(), ConfigError> {
        self.lock_log().start_of_stream += 1;
        Ok(())
    }

    fn end_of_stream(&mut self) -> Result<(), ConfigError> {
        self.lock_log().end_of_stream += 1;
        Ok(())
    }

    fn submit(&mut self, input: &InputUnit) -> Result<(), SubmitError> {
        self.lock_log().submit_attempts += 1;
        if let Some(code) = self.reject {
            return Err(SubmitError::Rejected(code));
        }
        if self.busy > 0 {
            self.busy -= 1;
            return Err(SubmitError::Busy);
        }
        assert!(
            !self.outstanding,
            "second input submitted before the previous one was drained"
        );
        self.outstanding = true;

        let data = input.data().unwrap().to_vec();
        self.lock_log()
            .submitted
            .push((input.timestamp(), input.duration(), data));
        Ok(())
    }

    fn query_output_requirements(&mut self) -> OutputRequirements {
        self.lock_log().requirement_queries += 1;
        self.stale = false;
        self.requirements
    }

    fn drain_one(&mut self, buffer: Option<Buffer>) -> TransformStatus {
        {
            let mut log = self.lock_log();
            log.drain_calls += 1;
            if self.stale {
                log.stale_drain = true;
            }
            if let Some(buffer) = &buffer {
                log.buffers_received += 1;
                let capacity = buffer.capacity();
                log.min_capacity_received = Some(
                    log.min_capacity_received
                        .map_or(capacity, |min| min.min(capacity)),
                );
            }
        }
        assert!(!self.stale, "drain_one called with stale output requirements");

        match self.script.pop_front() {
            Some(Step::Produce(pieces)) => {
                let unit = match buffer {
                    Some(mut buffer) => {
                        let joined = pieces.concat();
                        if joined.len() > buffer.capacity() {
                            return TransformStatus::Failed(E_BUFFER_TOO_SMALL);
                        }
                        buffer.fill(&joined).unwrap();
                        OutputUnit::single(buffer)
                    }
                    None => OutputUnit::new(
                        pieces
                            .iter()
                            .map(|piece| Buffer::from_slice(piece).unwrap())
                            .collect(),
                    ),
                };
                TransformStatus::Produced(unit)
            }
            Some(Step::NeedMore) | None => {
                self.outstanding = false;
                TransformStatus::NeedsMoreInput
            }
            Some(Step::FormatChange) => {
                self.outstanding = false;
                self.stale = true;
                TransformStatus::FormatChanged
            }
            Some(Step::Fail(code)) => {
                self.outstanding = false;
                TransformStatus::Failed(code)
            }
        }
    }
}

impl Drop for ScriptedTransform {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.dropped = true;
        }
    }
}

/// What a [`RecordingSink`] received.
#[derive(Debug, Clone, Default)]
pub(crate) struct SinkLog {
    pub payloads: Vec<(u64, Vec<u8>)>,
    pub closes: usize,
    pub dropped: bool,
}

/// Sink that records every payload.
pub(crate) struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    closed: bool,
}

impl RecordingSink {
    pub(crate) fn new() -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        (
            Self {
                log: log.clone(),
                closed: false,
            },
            log,
        )
    }
}

impl Sink for RecordingSink {
    fn accept(&mut self, duration_hint: u64, payload: &[u8]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        assert!(!payload.is_empty(), "sink called with an empty payload");
        self.log
            .lock()
            .unwrap()
            .payloads
            .push((duration_hint, payload.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if !self.closed {
            self.closed = true;
            self.log.lock().unwrap().closes += 1;
        }
        Ok(())
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.dropped = true;
        }
    }
}
