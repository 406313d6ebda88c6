// SPDX-License-Identifier: GPL-3.0-or-later

//! Client for the JSON API of Gazelle-based private trackers.
//!
//! Every call goes through a per-tracker token bucket so that announce
//! handling, manual snatches and remote requests together stay within the
//! tracker's rate policy.

pub mod api;
pub mod client;
pub mod error;
pub mod models;
pub mod rate_limiter;

pub use api::TrackerApi;
pub use client::{GazelleClient, GazelleClientBuilder, SessionState};
pub use error::{GazelleError, Result};
pub use rate_limiter::RateLimiter;
