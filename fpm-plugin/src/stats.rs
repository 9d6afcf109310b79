// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Statistics counters
//!
//! All counters are advisory: they use relaxed ordering and may lag the
//! state they describe by a beat. `ctxqueue_len` is incremented *before* the
//! matching enqueue so it never under-reports the queue length.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

const ORD: Ordering = Ordering::Relaxed;

#[derive(Debug, Default)]
pub(crate) struct FpmCounters {
    /// Bytes read from the peer socket.
    pub bytes_read: AtomicU32,
    /// Bytes written to the peer socket.
    pub bytes_sent: AtomicU32,
    /// Output buffer current usage.
    pub obuf_bytes: AtomicU32,
    /// Output buffer peak usage.
    pub obuf_peak: AtomicU32,
    /// Connections closed by the peer.
    pub connection_closes: AtomicU32,
    /// Connection errors (failed connects, read/write failures).
    pub connection_errors: AtomicU32,
    /// User configure requests.
    pub user_configures: AtomicU32,
    /// User disable requests.
    pub user_disables: AtomicU32,
    /// Dataplane contexts processed.
    pub dplane_contexts: AtomicU32,
    /// Dataplane contexts currently queued.
    pub ctxqueue_len: AtomicU32,
    /// Peak queued dataplane contexts.
    pub ctxqueue_len_peak: AtomicU32,
    /// Output-buffer-full events.
    pub buffer_full: AtomicU32,
}

impl FpmCounters {
    pub(crate) fn add(counter: &AtomicU32, value: u32) {
        counter.fetch_add(value, ORD);
    }

    pub(crate) fn sub(counter: &AtomicU32, value: u32) {
        counter.fetch_sub(value, ORD);
    }

    pub(crate) fn get(counter: &AtomicU32) -> u32 {
        counter.load(ORD)
    }

    /// Raise a peak counter if `candidate` exceeds the stored value.
    pub(crate) fn raise_peak(peak: &AtomicU32, candidate: u32) {
        if peak.load(ORD) < candidate {
            peak.store(candidate, ORD);
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.bytes_read,
            &self.bytes_sent,
            &self.obuf_bytes,
            &self.obuf_peak,
            &self.connection_closes,
            &self.connection_errors,
            &self.user_configures,
            &self.user_disables,
            &self.dplane_contexts,
            &self.ctxqueue_len,
            &self.ctxqueue_len_peak,
            &self.buffer_full,
        ] {
            counter.store(0, ORD);
        }
    }

    pub(crate) fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            bytes_read: Self::get(&self.bytes_read),
            bytes_sent: Self::get(&self.bytes_sent),
            obuf_bytes: Self::get(&self.obuf_bytes),
            obuf_peak: Self::get(&self.obuf_peak),
            connection_closes: Self::get(&self.connection_closes),
            connection_errors: Self::get(&self.connection_errors),
            dplane_contexts: Self::get(&self.dplane_contexts),
            ctxqueue_len: Self::get(&self.ctxqueue_len),
            ctxqueue_len_peak: Self::get(&self.ctxqueue_len_peak),
            buffer_full: Self::get(&self.buffer_full),
            user_configures: Self::get(&self.user_configures),
            user_disables: Self::get(&self.user_disables),
        }
    }
}

/// Point-in-time counter values, ready for text or JSON rendering.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CountersSnapshot {
    #[serde(rename = "bytes-read")]
    pub bytes_read: u32,
    #[serde(rename = "bytes-sent")]
    pub bytes_sent: u32,
    #[serde(rename = "obuf-bytes")]
    pub obuf_bytes: u32,
    #[serde(rename = "obuf-bytes-peak")]
    pub obuf_peak: u32,
    #[serde(rename = "connection-closes")]
    pub connection_closes: u32,
    #[serde(rename = "connection-errors")]
    pub connection_errors: u32,
    #[serde(rename = "data-plane-contexts")]
    pub dplane_contexts: u32,
    #[serde(rename = "data-plane-contexts-queue")]
    pub ctxqueue_len: u32,
    #[serde(rename = "data-plane-contexts-queue-peak")]
    pub ctxqueue_len_peak: u32,
    #[serde(rename = "buffer-full-hits")]
    pub buffer_full: u32,
    #[serde(rename = "user-configures")]
    pub user_configures: u32,
    #[serde(rename = "user-disables")]
    pub user_disables: u32,
}

impl CountersSnapshot {
    /// Render the aligned counters table shown by "show fpm counters".
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{:>30}\n{:>30}\n", "FPM counters", "============"));
        let mut row = |label: &str, value: u32| {
            out.push_str(&format!("{label:>28}: {value}\n"));
        };
        row("Input bytes", self.bytes_read);
        row("Output bytes", self.bytes_sent);
        row("Output buffer current size", self.obuf_bytes);
        row("Output buffer peak size", self.obuf_peak);
        row("Connection closes", self.connection_closes);
        row("Connection errors", self.connection_errors);
        row("Data plane items processed", self.dplane_contexts);
        row("Data plane items enqueued", self.ctxqueue_len);
        row("Data plane items queue peak", self.ctxqueue_len_peak);
        row("Buffer full hits", self.buffer_full);
        row("User FPM configurations", self.user_configures);
        row("User FPM disable requests", self.user_disables);
        out
    }

    /// Render to JSON with the stable key set.
    #[must_use]
    pub fn render_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("counters serialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_stable_keys() {
        let counters = FpmCounters::default();
        FpmCounters::add(&counters.bytes_sent, 42);
        FpmCounters::add(&counters.buffer_full, 1);
        let json = counters.snapshot().render_json();
        assert_eq!(json["bytes-sent"], 42);
        assert_eq!(json["buffer-full-hits"], 1);
        for key in [
            "bytes-read",
            "bytes-sent",
            "obuf-bytes",
            "obuf-bytes-peak",
            "connection-closes",
            "connection-errors",
            "data-plane-contexts",
            "data-plane-contexts-queue",
            "data-plane-contexts-queue-peak",
            "buffer-full-hits",
            "user-configures",
            "user-disables",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn reset_zeroes_everything() {
        let counters = FpmCounters::default();
        FpmCounters::add(&counters.bytes_read, 10);
        FpmCounters::raise_peak(&counters.obuf_peak, 99);
        counters.reset();
        let snap = counters.snapshot();
        assert_eq!(snap.bytes_read, 0);
        assert_eq!(snap.obuf_peak, 0);
    }

    #[test]
    fn peak_only_raises() {
        let counters = FpmCounters::default();
        FpmCounters::raise_peak(&counters.ctxqueue_len_peak, 5);
        FpmCounters::raise_peak(&counters.ctxqueue_len_peak, 3);
        assert_eq!(FpmCounters::get(&counters.ctxqueue_len_peak), 5);
    }
}
