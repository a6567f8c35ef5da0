// Copyright 2026 pwa-inspect Contributors
// SPDX-License-Identifier: Apache-2.0

//! pwa-inspect runtime library: PWA discovery, audit supervision and reporting.
//!
//! Everything that touches the network, a browser, or a child process
//! lives here; the pure analysis is in the `pwa-inspect` crate.

#![allow(clippy::new_without_default)]

pub mod acquisition;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod renderer;
pub mod report;
pub mod rest;
