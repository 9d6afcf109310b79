// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors surfaced by the plugin public API

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FpmError {
    #[error("failed to spawn the plugin thread: {0}")]
    ThreadSpawn(std::io::Error),

    #[error("the plugin thread is gone")]
    PluginGone,
}
