// SPDX-License-Identifier: GPL-3.0-or-later
pub mod autosnatch;
pub mod coordinator;
pub mod filtering;
pub mod history;
pub mod listener;
pub mod release_parsing;

pub use autosnatch::{AutosnatchState, AutosnatchSwitch};
pub use coordinator::{AnnounceOutcome, Snatch, SnatchCoordinator, SnatchError, TorrentLocks};
pub use filtering::{has_compatible_metadata, satisfies, FilterEngine};
pub use history::SnatchHistory;
pub use listener::run_listener;
pub use release_parsing::{
    AnnounceCaptures, AnnounceGrammar, AnnounceParser, ReleaseBuilder, ReleaseError,
};
