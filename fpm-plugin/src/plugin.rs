// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Plugin registration and lifecycle

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use derive_builder::Builder;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error};

use crate::ctl::FpmCtl;
use crate::engine::EngineHandle;
use crate::errors::FpmError;
use crate::events::FpmEvent;
use crate::obuf::OBUF_CAPACITY;
use crate::provider::{FpmProvider, PROVIDER_NAME};
use crate::session::{FpmCore, FpmSession, SessionMsg};

/// Plugin configuration. All fields default to the behavior of a freshly
/// registered plugin: disabled until an address is configured, nexthop
/// groups on, 3-second reconnect backoff.
#[derive(Builder, Debug)]
pub struct FpmParams {
    /// Peer to connect to at startup. Without one the plugin stays disabled
    /// until [`FpmCtl::set_address`] is called.
    #[builder(setter(into, strip_option), default)]
    pub address: Option<SocketAddr>,

    /// Encode nexthop-group operations (toggled at runtime with
    /// [`FpmCtl::use_nhg`]).
    #[builder(default = true)]
    pub use_nhg: bool,

    /// Use replace semantics for IPv6 route installs.
    #[builder(default = false)]
    pub v6_replace_semantics: bool,

    /// Backoff between connection attempts.
    #[builder(default = Duration::from_secs(3))]
    pub reconnect_delay: Duration,

    /// Resume delay for suspended RIB and RMAC walks.
    #[builder(default = Duration::from_secs(1))]
    pub rib_resume_delay: Duration,

    /// Output buffer capacity in bytes.
    #[builder(default = OBUF_CAPACITY)]
    pub obuf_capacity: usize,
}

impl Default for FpmParams {
    fn default() -> Self {
        FpmParamsBuilder::default().build().expect("builder defaults")
    }
}

/// A registered FPM plugin: owns the plugin thread and hands out the
/// provider half (driven by the engine) and the control half (driven by the
/// CLI).
pub struct FpmPlugin {
    core: Arc<FpmCore>,
    tx: UnboundedSender<SessionMsg>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FpmPlugin {
    /// Register the plugin with the engine: start the plugin thread and, if
    /// an address was configured, kick off the first connection.
    pub fn register(params: FpmParams, engine: EngineHandle) -> Result<FpmPlugin, FpmError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = Arc::new(FpmCore::new(&params, engine, tx.clone()));
        let initial_address = params.address;

        let session_core = Arc::clone(&core);
        let thread = thread::Builder::new()
            .name(PROVIDER_NAME.to_string())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("current thread runtime");
                rt.block_on(FpmSession::new(session_core, rx, &params).run());
            })
            .map_err(FpmError::ThreadSpawn)?;

        // The initial address travels through the event channel like a user
        // configuration, so the session applies it on its own thread.
        if let Some(address) = initial_address {
            let _ = tx.send(SessionMsg::Event(FpmEvent::SetAddress(address)));
        }

        debug!("{PROVIDER_NAME} registered");
        Ok(FpmPlugin {
            core,
            tx,
            thread: Some(thread),
        })
    }

    /// The provider half handed to the engine.
    #[must_use]
    pub fn provider(&self) -> FpmProvider {
        FpmProvider::new(Arc::clone(&self.core))
    }

    /// The control half handed to the CLI.
    #[must_use]
    pub fn ctl(&self) -> FpmCtl {
        FpmCtl::new(self.tx.clone(), Arc::clone(&self.core))
    }

    /// Stop the plugin: shut the session down (cancelling its tasks and
    /// closing the socket), then join the plugin thread.
    pub fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(SessionMsg::Shutdown);
            if thread.join().is_err() {
                error!("{PROVIDER_NAME} thread panicked");
            }
            debug!("{PROVIDER_NAME} is now stopped");
        }
    }
}

impl Drop for FpmPlugin {
    fn drop(&mut self) {
        self.stop();
    }
}
