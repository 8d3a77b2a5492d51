// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Property-based tests
//!
//! - **buffer_layout:** every pooled allocation honours the requested
//!   alignment and head-room, and memory always returns to the pool.
//! - **bridge_path:** arbitrary frame sequences cross
//!   `FromDevice -> ToDevice` unchanged and in order.
//! - **config_grammar:** the configuration parser never panics.

mod bridge_path;
mod buffer_layout;
mod config_grammar;
