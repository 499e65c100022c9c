use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the sink handles and the worker.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    flushes: AtomicU64,
    bytes_flushed: AtomicU64,
    flush_failures: AtomicU64,
    bytes_discarded: AtomicU64,
}

impl Counters {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, bytes: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.bytes_flushed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Bytes the writer took before a flush failed.
    pub(crate) fn record_partial_write(&self, bytes: usize) {
        self.bytes_flushed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, bytes: usize) {
        self.bytes_discarded
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SinkStats {
        SinkStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            bytes_flushed: self.bytes_flushed.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            bytes_discarded: self.bytes_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a sink's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Records enqueued for delivery.
    pub accepted: u64,
    /// Records refused because the queue was full or the sink was closed.
    pub rejected: u64,
    /// Successful flushes to the underlying writer.
    pub flushes: u64,
    /// Bytes accepted by the underlying writer, including the part of a
    /// failed flush it took before failing.
    pub bytes_flushed: u64,
    /// Flushes the underlying writer failed.
    pub flush_failures: u64,
    /// Bytes dropped after failed flushes.
    pub bytes_discarded: u64,
}
