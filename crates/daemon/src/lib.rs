// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! scanq daemon library
//!
//! Exposes the IPC protocol types for tool-invocation clients and the
//! lifecycle/listener plumbing for the `scanqd` binary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod protocol;
pub mod protocol_wire;

pub use lifecycle::{Config, LifecycleError};
pub use listener::AppContext;
pub use protocol::{
    DlqStatusEntry, QueueStatusEntry, Request, Response, PROTOCOL_VERSION,
};
pub use protocol_wire::{
    decode, encode, read_message, write_message, ProtocolError, DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE,
};
