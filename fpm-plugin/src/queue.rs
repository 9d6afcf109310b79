// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Context queue between the engine thread and the plugin thread

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::ctx::DplaneCtx;
use crate::stats::FpmCounters;

/// FIFO of dataplane contexts waiting to be encoded. The length counter is
/// bumped before the push so it never reads below the true queue length.
#[derive(Debug, Default)]
pub(crate) struct CtxQueue {
    inner: Mutex<VecDeque<DplaneCtx>>,
}

impl CtxQueue {
    pub(crate) fn push(&self, counters: &FpmCounters, ctx: DplaneCtx) {
        FpmCounters::add(&counters.ctxqueue_len, 1);
        self.inner.lock().unwrap().push_back(ctx);
    }

    pub(crate) fn pop(&self, counters: &FpmCounters) -> Option<DplaneCtx> {
        let ctx = self.inner.lock().unwrap().pop_front();
        if ctx.is_some() {
            FpmCounters::sub(&counters.ctxqueue_len, 1);
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::DplaneOp;

    #[test]
    fn counter_tracks_queue_length() {
        let queue = CtxQueue::default();
        let counters = FpmCounters::default();
        queue.push(&counters, DplaneCtx::other(DplaneOp::VtepAdd));
        queue.push(&counters, DplaneCtx::other(DplaneOp::VtepDelete));
        assert_eq!(FpmCounters::get(&counters.ctxqueue_len), 2);

        let first = queue.pop(&counters).unwrap();
        assert_eq!(first.op, DplaneOp::VtepAdd);
        assert_eq!(FpmCounters::get(&counters.ctxqueue_len), 1);
        assert!(queue.pop(&counters).is_some());
        assert!(queue.pop(&counters).is_none());
        assert_eq!(FpmCounters::get(&counters.ctxqueue_len), 0);
    }
}
