// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-storage: Durable execution log for the Foreman task executor

pub mod log;
pub mod store;

pub use log::JsonlStore;
pub use store::{ExecutionStore, StoreError};
