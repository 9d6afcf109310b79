// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Provider glue: the engine-facing half of the plugin
//!
//! The engine calls [`FpmProvider::process`] on every tick with the batch of
//! contexts it produced. While connected, contexts queue towards the plugin
//! thread; otherwise they complete immediately, since the replay walk will
//! reconstruct the peer state on the next connect.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::ctx::{CtxStatus, DplaneCtx};
use crate::session::FpmCore;
use crate::stats::FpmCounters;

/// Name the plugin registers under.
pub const PROVIDER_NAME: &str = "dplane_fpm";

/// The engine's view of one provider tick: the input batch and how many
/// contexts the provider may take before yielding.
#[derive(Debug)]
pub struct ProviderIo {
    pub input: VecDeque<DplaneCtx>,
    pub work_limit: usize,
}

impl ProviderIo {
    #[must_use]
    pub fn new(work_limit: usize) -> Self {
        ProviderIo {
            input: VecDeque::new(),
            work_limit,
        }
    }
}

/// Engine-side handle to the plugin.
#[derive(Clone)]
pub struct FpmProvider {
    core: Arc<FpmCore>,
}

impl FpmProvider {
    pub(crate) fn new(core: Arc<FpmCore>) -> Self {
        FpmProvider { core }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    /// Drain up to `work_limit` contexts from the engine's input queue.
    /// Returns true when the limit was hit and the engine should reschedule
    /// the provider.
    pub fn process(&self, io: &mut ProviderIo) -> bool {
        let core = &self.core;
        let counters = &core.counters;

        let mut taken = 0usize;
        let mut peak_queue = 0u32;
        while taken < io.work_limit {
            let Some(mut ctx) = io.input.pop_front() else {
                break;
            };
            taken += 1;

            if core.is_connected() {
                // A steady-state refresh makes the replay walk skip the
                // object, the update itself carries the current state.
                core.engine.tables().note_refreshed(&ctx);
                core.ctxqueue.push(counters, ctx);
                peak_queue = peak_queue.max(FpmCounters::get(&counters.ctxqueue_len));
                continue;
            }

            // Skip all notifications if not connected; the walk covers them.
            ctx.status = CtxStatus::Success;
            core.engine.push_completed(ctx);
        }

        FpmCounters::raise_peak(&counters.ctxqueue_len_peak, peak_queue);

        // Wake the plugin thread if there is queued work for it.
        if FpmCounters::get(&counters.ctxqueue_len) > 0 {
            core.dequeue_ready.notify_one();
        }

        io.work_limit > 0 && taken >= io.work_limit
    }
}
