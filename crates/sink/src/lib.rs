//! Asynchronous buffered write sink.
//!
//! Producers hand formatted records to a [`BufferedSink`], which copies them
//! onto a bounded queue and returns straight away. A dedicated worker drains
//! the queue into an in-memory buffer and writes that buffer to the wrapped
//! [`std::io::Write`] when it grows past a size threshold or when the flush
//! timer fires, whichever comes first. [`BufferedSink::stop`] drains what is
//! left, performs one last flush and waits for the worker to exit.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod stats;
mod worker;

pub use config::{
    DEFAULT_FLUSH_INTERVAL, DEFAULT_FLUSH_THRESHOLD, DEFAULT_QUEUE_CAPACITY, FlushFailurePolicy,
    OverflowPolicy, SinkConfig, SinkConfigBuilder,
};
pub use error::{Error, Result};
pub use stats::SinkStats;

use crate::stats::Counters;
use crate::worker::Batcher;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};

use flume::{SendTimeoutError, TrySendError};
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing_subscriber::fmt::MakeWriter;

/// Lifecycle of a sink. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SinkState {
    /// Worker alive, records accepted.
    Running = 0,
    /// Stop requested; the worker is performing its final flush.
    Draining = 1,
    /// Worker exited.
    Stopped = 2,
}

impl SinkState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Handle to a buffered sink. Clones share the same queue and worker.
#[derive(Clone, Debug)]
pub struct BufferedSink {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: SinkConfig,
    /// `None` once the sink has been stopped. Producers hold the read side
    /// across the enqueue so `stop` cannot slip in between check and send.
    sender: RwLock<Option<flume::Sender<Vec<u8>>>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: AtomicU8,
    counters: Arc<Counters>,
}

impl BufferedSink {
    /// Creates a sink in front of `writer` and starts its worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the worker thread
    /// or its runtime cannot be created.
    pub fn new<W>(writer: W, config: SinkConfig) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| Error::Io("failed to build sink runtime", e))?;

        let (sender, receiver) = flume::bounded(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let counters = Arc::new(Counters::default());

        let batcher = Batcher::new(writer, &config, counters.clone());
        let flush_interval = config.flush_interval;

        let worker = thread::Builder::new()
            .name("logroll-sink".to_string())
            .spawn(move || {
                runtime.block_on(worker::run(receiver, shutdown_rx, batcher, flush_interval));
            })
            .map_err(|e| Error::Io("failed to spawn sink worker", e))?;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                sender: RwLock::new(Some(sender)),
                shutdown: Mutex::new(Some(shutdown_tx)),
                worker: Mutex::new(Some(worker)),
                state: AtomicU8::new(SinkState::Running as u8),
                counters,
            }),
        })
    }

    /// Copies `bytes` onto the pending queue.
    ///
    /// Success means the record was accepted for asynchronous delivery, not
    /// that it reached the writer. Writer failures are never reported here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`] when the overflow policy gives up on a full
    /// queue, and [`Error::SinkClosed`] once [`stop`](Self::stop) has been called.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let sender = self.shared.sender.read();

        let Some(sender) = sender.as_ref() else {
            self.shared.counters.record_rejected();
            return Err(Error::SinkClosed);
        };

        if bytes.is_empty() {
            return Ok(0);
        }

        let record = bytes.to_vec();

        let sent = match self.shared.config.overflow {
            OverflowPolicy::Block => sender.send(record).map_err(|_| Error::SinkClosed),
            OverflowPolicy::BlockTimeout(timeout) => {
                sender.send_timeout(record, timeout).map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => Error::QueueFull,
                    SendTimeoutError::Disconnected(_) => Error::SinkClosed,
                })
            }
            OverflowPolicy::Reject => sender.try_send(record).map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull,
                TrySendError::Disconnected(_) => Error::SinkClosed,
            }),
        };

        match sent {
            Ok(()) => {
                self.shared.counters.record_accepted();
                Ok(bytes.len())
            }
            Err(e) => {
                self.shared.counters.record_rejected();
                Err(e)
            }
        }
    }

    /// Does nothing: flushing is owned by the worker and its timer.
    ///
    /// # Errors
    ///
    /// Never fails. The signature matches flushable writer interfaces.
    #[allow(clippy::unused_self)]
    pub fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Signals the worker to flush what it holds and exit, then waits for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkClosed`] if the sink was already stopped (or is
    /// being stopped by another caller).
    pub fn stop(&self) -> Result<()> {
        self.shared.stop()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Snapshot of the sink's counters.
    #[must_use]
    pub fn stats(&self) -> SinkStats {
        self.shared.counters.snapshot()
    }

    /// Configuration the sink was built with.
    #[must_use]
    pub fn config(&self) -> &SinkConfig {
        &self.shared.config
    }
}

impl Shared {
    fn stop(&self) -> Result<()> {
        let Some(sender) = self.sender.write().take() else {
            return Err(Error::SinkClosed);
        };

        self.state
            .store(SinkState::Draining as u8, Ordering::Release);
        drop(sender);

        if let Some(shutdown) = self.shutdown.lock().take() {
            // The worker may already have exited on disconnect.
            let _ = shutdown.send(());
        }

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                eprintln!("logroll-sink: flush worker panicked");
            }
        }

        self.state.store(SinkState::Stopped as u8, Ordering::Release);

        Ok(())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl<'a> MakeWriter<'a> for BufferedSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter { sink: self.clone() }
    }
}

/// [`std::io::Write`] adapter over a [`BufferedSink`], one per formatted event.
#[derive(Clone, Debug)]
pub struct SinkWriter {
    sink: BufferedSink,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.sink.write(buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(self.sink.sync()?)
    }
}
