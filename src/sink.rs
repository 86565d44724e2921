//! Concrete payload sinks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use framepump_codec::{annexb, Sink, SinkError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Writes every payload to a file as-is.
///
/// No container framing is added; an H.264 stream becomes a raw Annex B
/// elementary stream and a raw stream a headerless frame dump.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    payloads: u64,
    bytes_written: u64,
}

impl FileSink {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        tracing::info!("Writing payloads to {}", path.display());
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            payloads: 0,
            bytes_written: 0,
        })
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total payload bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Sink for FileSink {
    fn accept(&mut self, duration_hint: u64, payload: &[u8]) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        writer.write_all(payload)?;

        self.payloads += 1;
        self.bytes_written += payload.len() as u64;

        if tracing::enabled!(tracing::Level::TRACE) && annexb::starts_with_start_code(payload) {
            let nals = annexb::split_nal_units(payload);
            tracing::trace!(
                nal_units = nals.len(),
                idr = nals.iter().any(|nal| nal.is_idr()),
                bytes = payload.len(),
                duration_hint,
                "Access unit written"
            );
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::info!(
                "Closed {}: {} payloads, {} bytes",
                self.path.display(),
                self.payloads,
                self.bytes_written
            );
        }
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close {}: {}", self.path.display(), e);
        }
    }
}

/// Runs another sink on tokio's blocking pool behind a bounded queue.
///
/// `accept` only enqueues the payload and waits when the queue is full, so
/// slow I/O applies backpressure to the pump instead of growing memory.
/// Errors from the wrapped sink stop the worker and surface on the next
/// `accept` or on `close`.
///
/// `accept` and `close` block the calling thread and must not be called
/// from async code; run the pump on a `spawn_blocking` thread. Dropping
/// without `close` is allowed anywhere: the worker finishes in the
/// background and errors are only logged.
pub struct BackgroundSink {
    tx: Option<mpsc::Sender<(u64, Bytes)>>,
    worker: Option<JoinHandle<Result<(), SinkError>>>,
    handle: Handle,
}

impl BackgroundSink {
    /// Spawn a worker on the current tokio runtime that feeds `inner`.
    ///
    /// Up to `capacity` payloads may be queued.
    pub fn new<S: Sink + 'static>(inner: S, capacity: usize) -> Result<Self, SinkError> {
        let handle = Handle::try_current()
            .map_err(|e| SinkError::Other(format!("no tokio runtime: {}", e)))?;
        Ok(Self::spawn(&handle, inner, capacity))
    }

    /// Spawn a worker on `handle` that feeds `inner`.
    pub fn spawn<S: Sink + 'static>(handle: &Handle, inner: S, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<(u64, Bytes)>(capacity.max(1));

        let worker = handle.spawn_blocking(move || {
            let mut inner = inner;
            let mut result = Ok(());
            while let Some((duration_hint, payload)) = rx.blocking_recv() {
                if let Err(e) = inner.accept(duration_hint, &payload) {
                    tracing::error!("Background sink write failed: {}", e);
                    result = Err(e);
                    break;
                }
            }
            let closed = inner.close();
            result.and(closed)
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
            handle: handle.clone(),
        }
    }

    fn join_worker(&mut self) -> Result<(), SinkError> {
        match self.worker.take() {
            Some(worker) => self
                .handle
                .block_on(worker)
                .map_err(|e| SinkError::Other(format!("background sink worker failed: {}", e)))?,
            None => Ok(()),
        }
    }
}

impl Sink for BackgroundSink {
    fn accept(&mut self, duration_hint: u64, payload: &[u8]) -> Result<(), SinkError> {
        let tx = self.tx.as_ref().ok_or(SinkError::Closed)?;
        if tx
            .blocking_send((duration_hint, Bytes::copy_from_slice(payload)))
            .is_ok()
        {
            return Ok(());
        }

        // The worker stopped; report why.
        self.tx = None;
        self.join_worker()?;
        Err(SinkError::Closed)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        // Dropping the sender lets the worker drain the queue and exit.
        self.tx = None;
        self.join_worker()
    }
}

impl Drop for BackgroundSink {
    fn drop(&mut self) {
        // Joining here would block inside async code. The worker drains the
        // queue and closes the inner sink on its own once the sender is gone.
        self.tx = None;
        if self.worker.take().is_some() {
            tracing::debug!("Background sink dropped without close, worker detached");
        }
    }
}
