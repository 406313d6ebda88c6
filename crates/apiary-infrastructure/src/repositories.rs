// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Result;
use apiary_domain::{GroupId, SnatchHistoryEntry, TorrentId};

/// Append-only store of snatches, queried per tracker.
#[async_trait::async_trait]
pub trait SnatchHistoryRepository: Send + Sync {
    async fn record(&self, entry: SnatchHistoryEntry) -> Result<SnatchHistoryEntry>;
    async fn list_by_tracker(&self, tracker: &str) -> Result<Vec<SnatchHistoryEntry>>;
    async fn find_by_primary_artist(
        &self,
        tracker: &str,
        artist: &str,
    ) -> Result<Vec<SnatchHistoryEntry>>;
    async fn find_by_group(&self, tracker: &str, group_id: GroupId)
        -> Result<Vec<SnatchHistoryEntry>>;
    async fn contains_torrent(&self, tracker: &str, torrent_id: TorrentId) -> Result<bool>;
}
