// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library-level command implementations for `solace-gw-cli`, split out of
//! `main.rs` so they're testable without spawning the binary.

pub mod commands;
