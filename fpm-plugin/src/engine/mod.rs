// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The engine-side state the plugin consumes: VRFs, interfaces, SRv6
//! locators, and the four replayable tables (LSPs, nexthop groups, RIB,
//! L3VNI router MACs) with their per-object "sent" flags.
//!
//! The host engine owns this state; the plugin reaches it through an
//! [`EngineHandle`]. Sent flags are only ever mutated under the tables lock,
//! so replay walks and steady-state refreshes cannot race.

mod tables;

pub use tables::{
    EngineInterface, EngineTables, LspEntry, NhgEntry, RibDest, RmacEntry, Srv6Locator, VrfInfo,
};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ctx::DplaneCtx;

/// Shared handle to the engine: the tables plus the two queues flowing back
/// to it (completed contexts and inbound route notifications).
#[derive(Clone, Debug, Default)]
pub struct EngineHandle {
    tables: Arc<Mutex<EngineTables>>,
    completed: Arc<Mutex<VecDeque<DplaneCtx>>>,
    notifications: Arc<Mutex<VecDeque<DplaneCtx>>>,
}

impl EngineHandle {
    #[must_use]
    pub fn new(tables: EngineTables) -> Self {
        EngineHandle {
            tables: Arc::new(Mutex::new(tables)),
            completed: Arc::default(),
            notifications: Arc::default(),
        }
    }

    /// Lock the engine tables.
    ///
    /// # Panics
    ///
    /// Panics if a holder of the lock panicked.
    pub fn tables(&self) -> MutexGuard<'_, EngineTables> {
        self.tables.lock().unwrap()
    }

    /// Return a processed context to the engine's output queue.
    pub fn push_completed(&self, ctx: DplaneCtx) {
        self.completed.lock().unwrap().push_back(ctx);
    }

    /// Drain the contexts completed since the last call.
    #[must_use]
    pub fn drain_completed(&self) -> Vec<DplaneCtx> {
        self.completed.lock().unwrap().drain(..).collect()
    }

    /// Hand the engine a route notification decoded from the peer.
    pub fn push_notification(&self, ctx: DplaneCtx) {
        self.notifications.lock().unwrap().push_back(ctx);
    }

    /// Drain pending route notifications.
    #[must_use]
    pub fn drain_notifications(&self) -> Vec<DplaneCtx> {
        self.notifications.lock().unwrap().drain(..).collect()
    }
}
