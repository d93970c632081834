// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared types used by both planes: errors and configuration.

pub mod config;
pub mod error;

pub use config::{DataMode, ReceiveHandler, RuntimeConfig};
pub use error::{RuntimeError, RuntimeResult};
