//! Lifecycle controller owning one transform, its pump and an optional sink.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    ConfigError, EncodedPayload, FramePump, PumpError, PumpOptions, RawFrame, SessionStats, Sink,
    StreamConfig, TransformHandle,
};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// No transform is configured.
    Uninitialized,
    /// Formats are negotiated; streaming notifications not yet issued.
    Configured,
    /// Frames may be processed.
    Streaming,
    /// Shut down. The transform and sink have been released.
    Stopped,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Streaming => "streaming",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

type TransformFactory<T> = Box<dyn FnMut() -> Result<T, ConfigError> + Send>;

struct SessionInner<T> {
    state: LifecycleState,
    factory: TransformFactory<T>,
    config: Option<StreamConfig>,
    options: PumpOptions,
    pump: Option<FramePump<T>>,
    sink: Option<Box<dyn Sink>>,
    last_stats: SessionStats,
}

impl<T: TransformHandle> SessionInner<T> {
    fn shutdown(&mut self) {
        let previous = self.state;

        if let Some(pump) = self.pump.take() {
            self.last_stats = pump.stats();
            drop(pump);
        }
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                tracing::warn!("Failed to close sink: {}", e);
            }
        }

        self.state = LifecycleState::Stopped;
        if previous != LifecycleState::Stopped {
            tracing::info!(from = %previous, "Session stopped");
        }
    }
}

/// Owns a transform for the length of a stream and drives it through
/// `Uninitialized → Configured → Streaming → Stopped`.
///
/// Every operation takes `&self`; an internal lock serializes them, so a
/// session can be shared between threads and at most one frame is in flight
/// on the transform at any time.
///
/// The transform is created by a factory at [`initialize`](Self::initialize)
/// so the session can be re-initialized after a shutdown.
pub struct TransformSession<T> {
    inner: Mutex<SessionInner<T>>,
}

impl<T: TransformHandle> TransformSession<T> {
    /// Create an uninitialized session.
    pub fn new<F>(factory: F, options: PumpOptions) -> Self
    where
        F: FnMut() -> Result<T, ConfigError> + Send + 'static,
    {
        Self {
            inner: Mutex::new(SessionInner {
                state: LifecycleState::Uninitialized,
                factory: Box::new(factory),
                config: None,
                options,
                pump: None,
                sink: None,
                last_stats: SessionStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the sink that receives non-empty payloads.
    ///
    /// A previously registered sink is closed and replaced.
    pub fn set_sink(&self, sink: impl Sink + 'static) {
        let mut inner = self.lock();
        if let Some(mut old) = inner.sink.replace(Box::new(sink)) {
            if let Err(e) = old.close() {
                tracing::warn!("Failed to close replaced sink: {}", e);
            }
        }
    }

    /// Create and configure a transform for `config`.
    ///
    /// Valid from `Uninitialized` or `Stopped`. On failure the session is
    /// left `Uninitialized` and the partially configured transform dropped.
    pub fn initialize(&self, config: StreamConfig) -> Result<(), ConfigError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        match inner.state {
            LifecycleState::Uninitialized | LifecycleState::Stopped => {}
            state => {
                return Err(ConfigError::not_ready(format!(
                    "cannot initialize while {}",
                    state
                )));
            }
        }

        inner.state = LifecycleState::Uninitialized;
        inner.config = None;

        config.validate()?;

        let mut transform = (inner.factory)()?;
        let input = config.input_format();
        let output = config.output_format();
        transform.configure(&input, &output)?;

        if !transform.input_ready() {
            tracing::error!("Transform configured but not accepting input");
            return Err(ConfigError::InputNotAccepted);
        }

        tracing::info!(
            width = config.width,
            height = config.height,
            input = ?config.input_subtype,
            output = ?config.output_subtype,
            fps_num = config.frame_rate.0,
            fps_den = config.frame_rate.1,
            bitrate = config.bitrate,
            "Transform configured"
        );

        let options = inner.options.clone();
        inner.pump = Some(FramePump::new(transform, config.frame_duration(), options));
        inner.config = Some(config);
        inner.last_stats = SessionStats::default();
        inner.state = LifecycleState::Configured;
        Ok(())
    }

    /// Issue the streaming notifications and move to `Streaming`.
    ///
    /// A no-op while already streaming.
    pub fn start(&self) -> Result<(), ConfigError> {
        let mut inner = self.lock();

        match inner.state {
            LifecycleState::Streaming => return Ok(()),
            LifecycleState::Configured => {}
            state => {
                return Err(ConfigError::not_ready(format!("cannot start while {}", state)));
            }
        }

        let pump = inner
            .pump
            .as_mut()
            .ok_or_else(|| ConfigError::not_ready("no transform"))?;
        let transform = pump.transform_mut();
        transform.begin_streaming()?;
        transform.start_of_stream()?;

        inner.state = LifecycleState::Streaming;
        tracing::info!("Streaming started");
        Ok(())
    }

    /// Submit one frame and return everything the transform produced for it.
    ///
    /// Calls from several threads are serialized. If the frame could not be
    /// submitted (`Saturated`, `Interrupted`), output drained for earlier
    /// frames has already been forwarded to the sink.
    pub fn process_frame(&self, raw: &RawFrame<'_>) -> Result<EncodedPayload, PumpError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.state != LifecycleState::Streaming {
            return Err(PumpError::NotStreaming(inner.state));
        }
        let pump = inner
            .pump
            .as_mut()
            .ok_or(PumpError::NotStreaming(inner.state))?;

        let sink = inner.sink.as_deref_mut().map(|s| s as &mut dyn Sink);
        pump.process_frame(raw, sink)
    }

    /// Signal end of stream and drain what the transform still holds.
    ///
    /// Returns to `Configured`; call [`start`](Self::start) to stream again.
    /// If the drain stops on a format change the session stays `Streaming`
    /// and the payload is flagged, so the caller can flush again.
    pub fn flush(&self) -> Result<EncodedPayload, PumpError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.state != LifecycleState::Streaming {
            return Err(PumpError::NotStreaming(inner.state));
        }
        let pump = inner
            .pump
            .as_mut()
            .ok_or(PumpError::NotStreaming(inner.state))?;

        pump.transform_mut().end_of_stream()?;
        let sink = inner.sink.as_deref_mut().map(|s| s as &mut dyn Sink);
        let payload = pump.drain_remaining(sink)?;

        if payload.format_changed {
            tracing::info!(bytes = payload.len(), "Flush interrupted by format change");
        } else {
            inner.state = LifecycleState::Configured;
            tracing::info!(bytes = payload.len(), units = payload.units, "Stream flushed");
        }
        Ok(payload)
    }

    /// Release the transform and close the sink. Valid from any state and
    /// safe to call repeatedly.
    pub fn shutdown(&self) {
        self.lock().shutdown();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Counters for the current (or last) stream.
    pub fn stats(&self) -> SessionStats {
        let inner = self.lock();
        inner
            .pump
            .as_ref()
            .map_or(inner.last_stats, FramePump::stats)
    }

    /// Committed stream configuration, if initialized.
    pub fn config(&self) -> Option<StreamConfig> {
        self.lock().config.clone()
    }
}

impl<T> Drop for TransformSession<T> {
    fn drop(&mut self) {
        // `close()` may block, so a dropped session only drops its sink and
        // leaves the final flush to the sink's own `Drop`. Call `shutdown()`
        // for an orderly close.
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        inner.pump.take();
        inner.sink.take();
        inner.state = LifecycleState::Stopped;
    }
}
