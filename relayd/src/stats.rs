//! Pipeline counters.
//!
//! Fire-and-forget atomic counters recorded from the hot paths and read
//! back as a coherent-enough snapshot for logs and tests. Relaxed ordering
//! throughout; these are statistics, not synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every stage of one server or client pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_in: AtomicU64,
    frames_out: AtomicU64,
    inbound_dropped: AtomicU64,
    parse_failures: AtomicU64,
    send_failures: AtomicU64,
    accepted: AtomicU64,
    disconnected: AtomicU64,
    reconnects: AtomicU64,
}

impl PipelineStats {
    #[inline]
    pub(crate) fn record_frame_in(&self) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_frame_out(&self) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_inbound_drop(&self) {
        self.inbound_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_disconnect(&self) {
        self.disconnected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            inbound_dropped: self.inbound_dropped.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            disconnected: self.disconnected.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value view of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames parsed successfully and handed to the user handler.
    pub frames_in: u64,
    /// Frames serialized and written (broadcast counts once per task).
    pub frames_out: u64,
    /// Inbound reads dropped because the inbound queue was full.
    pub inbound_dropped: u64,
    /// Inbound frames rejected by the codec.
    pub parse_failures: u64,
    /// Socket writes that failed or timed out waiting for writability.
    pub send_failures: u64,
    /// Connections accepted (server) or established (client).
    pub accepted: u64,
    /// Connections closed on the read path.
    pub disconnected: u64,
    /// Successful re-handshakes after a connection loss (client).
    pub reconnects: u64,
}
