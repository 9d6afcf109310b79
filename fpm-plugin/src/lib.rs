// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A dataplane plugin that streams forwarding state to a Forwarding Plane
//! Manager (FPM) peer over TCP.
//!
//! The host routing engine hands the plugin a stream of dataplane operation
//! contexts (routes, nexthop groups, LSPs, EVPN router MACs, SRv6 objects);
//! the plugin encodes each into a framed netlink message and writes it to a
//! persistent socket. On every (re)connection it replays the engine tables
//! (LSPs, nexthop groups, RIB, router MACs) so the peer converges to the
//! current state.

#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::similar_names,
    clippy::struct_field_names,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::module_name_repetitions
)]

mod ctl;
mod ctx;
mod encode;
mod engine;
mod errors;
mod events;
mod obuf;
mod plugin;
mod provider;
mod queue;
mod session;
mod stats;

// re-exports
pub use ctl::FpmCtl;
pub use ctx::{
    AddrCtx, CtxBody, CtxStatus, DplaneCtx, DplaneOp, LspCtx, LspNexthop, MacCtx, Nexthop,
    NexthopCtx, RouteCtx, RouteNotifyCtx, RouteProtocol, Seg6LocalAction, Seg6LocalCtx, Srv6Info,
};
pub use engine::{
    EngineHandle, EngineInterface, EngineTables, LspEntry, NhgEntry, RibDest, RmacEntry,
    Srv6Locator, VrfInfo,
};
pub use errors::FpmError;
pub use events::{FpmEvent, WalkSource};
pub use plugin::{FpmParams, FpmParamsBuilder, FpmParamsBuilderError, FpmPlugin};
pub use provider::{FpmProvider, ProviderIo, PROVIDER_NAME};
pub use stats::CountersSnapshot;

/// Scratch-buffer size for a single encoded netlink message; also the
/// output-buffer low-water mark below which dequeueing pauses.
pub const NL_PKT_BUF_SIZE: usize = 8192;

/// Default FPM peer port.
pub const FPM_DEFAULT_PORT: u16 = 2620;

/// Default FPM peer address (the local host).
pub const FPM_DEFAULT_ADDRESS: std::net::IpAddr =
    std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
