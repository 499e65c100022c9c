//! Background flush loop.
//!
//! Nothing in here may emit `tracing` events: the worker sits underneath the
//! subscriber that would receive them, so diagnostics go to stderr instead.

use crate::config::{FlushFailurePolicy, SinkConfig};
use crate::stats::Counters;

use std::io::Write;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Accumulation buffer plus the writer it drains into. Owned by the worker.
pub(crate) struct Batcher<W> {
    writer: W,
    buffer: Vec<u8>,
    flush_threshold: usize,
    on_flush_failure: FlushFailurePolicy,
    counters: Arc<Counters>,
    /// Set while the buffer holds retained bytes from a failed flush. Only the
    /// timer and shutdown retry the writer until it accepts them.
    retrying: bool,
}

impl<W: Write> Batcher<W> {
    pub(crate) fn new(writer: W, config: &SinkConfig, counters: Arc<Counters>) -> Self {
        Self {
            writer,
            buffer: Vec::with_capacity(config.flush_threshold),
            flush_threshold: config.flush_threshold,
            on_flush_failure: config.on_flush_failure,
            counters,
            retrying: false,
        }
    }

    fn append(&mut self, record: &[u8]) {
        self.buffer.extend_from_slice(record);

        if !self.retrying {
            if self.buffer.len() >= self.flush_threshold {
                self.flush();
            }
            return;
        }

        if let FlushFailurePolicy::Retain { max_bytes } = self.on_flush_failure {
            if self.buffer.len() > max_bytes {
                let len = self.buffer.len();
                eprintln!("logroll-sink: retained {len} bytes past bound, dropping them");
                self.counters.record_discarded(len);
                self.buffer.clear();
                self.retrying = false;
            }
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let len = self.buffer.len();
        let (written, result) = self.write_batch();

        match result {
            Ok(()) => {
                self.counters.record_flush(len);
                self.buffer.clear();
                self.retrying = false;
            }
            Err(e) => {
                self.counters.record_flush_failure();

                // Whatever the writer already took must never be sent again.
                self.counters.record_partial_write(written);
                self.buffer.drain(..written);
                let remaining = self.buffer.len();

                let retain = match self.on_flush_failure {
                    FlushFailurePolicy::Discard => false,
                    FlushFailurePolicy::Retain { max_bytes } => remaining <= max_bytes,
                };

                if retain {
                    eprintln!(
                        "logroll-sink: flush failed after {written} of {len} bytes, retrying later: {e}"
                    );
                    self.retrying = remaining > 0;
                } else {
                    eprintln!(
                        "logroll-sink: flush failed after {written} of {len} bytes, dropping the rest: {e}"
                    );
                    self.counters.record_discarded(remaining);
                    self.buffer.clear();
                    self.retrying = false;
                }
            }
        }
    }

    /// Writes the buffer, returning how many bytes the writer accepted even
    /// when it fails part way.
    fn write_batch(&mut self) -> (usize, std::io::Result<()>) {
        let mut written = 0;

        while written < self.buffer.len() {
            match self.writer.write(&self.buffer[written..]) {
                Ok(0) => {
                    return (
                        written,
                        Err(std::io::Error::from(std::io::ErrorKind::WriteZero)),
                    );
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return (written, Err(e)),
            }
        }

        (written, self.writer.flush())
    }
}

/// Runs until the shutdown signal fires or every producer handle is gone.
///
/// Either way the queue is drained into the buffer and flushed exactly once
/// before returning.
pub(crate) async fn run<W: Write>(
    receiver: flume::Receiver<Vec<u8>>,
    mut shutdown: oneshot::Receiver<()>,
    mut batcher: Batcher<W>,
    flush_interval: std::time::Duration,
) {
    // First tick one period from now rather than immediately.
    let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                batcher.flush();
            }

            received = receiver.recv_async() => {
                match received {
                    Ok(record) => batcher.append(&record),
                    Err(flume::RecvError::Disconnected) => break,
                }
            }

            _ = &mut shutdown => break,
        }
    }

    for record in receiver.try_iter() {
        batcher.buffer.extend_from_slice(&record);
    }

    batcher.flush();
}
