// Copyright 2026 Tweetline Contributors
// SPDX-License-Identifier: MIT

//! Tweetline runtime: drives a headless browser over a profile timeline,
//! captures the timeline data calls, replays them and normalizes the
//! results with the `tweetline` core crate.
//!
//! Exposed as a library for the binary and for integration tests.

pub mod cli;
pub mod config;
pub mod pacing;
pub mod pipeline;
pub mod renderer;
pub mod replay;
pub mod session;

pub use config::{ConfigError, DelayRange, HarvestConfig};
pub use pipeline::{Harvest, HarvestOutcome, HarvestReport, NoDataReason, Pipeline};
pub use session::{SessionDriver, SessionOutcome, StopReason};
