// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use anyhow::Result;
use apiary_domain::{Release, SnatchHistoryEntry, TorrentId};
use apiary_infrastructure::SnatchHistoryRepository;
use tracing::debug;

/// Dedupe queries and recording on top of the snatch history store.
#[derive(Clone)]
pub struct SnatchHistory {
    repository: Arc<dyn SnatchHistoryRepository>,
}

impl SnatchHistory {
    pub fn new(repository: Arc<dyn SnatchHistoryRepository>) -> Self {
        Self { repository }
    }

    /// Whether an equivalent release was already snatched from `tracker`.
    pub async fn already_snatched_duplicate(
        &self,
        tracker: &str,
        release: &Release,
    ) -> Result<bool> {
        let entries = self
            .repository
            .find_by_primary_artist(tracker, release.primary_artist())
            .await?;
        let found = entries.iter().any(|e| e.release.is_duplicate(release));
        if found {
            debug!(target: "history", %tracker, torrent_id = %release.torrent_id, "duplicate found in history");
        }
        Ok(found)
    }

    /// Whether anything from the release's torrent group was already snatched.
    pub async fn already_snatched_from_group(
        &self,
        tracker: &str,
        release: &Release,
    ) -> Result<bool> {
        let Some(group_id) = release.group_id else {
            return Ok(false);
        };
        let entries = self.repository.find_by_group(tracker, group_id).await?;
        let found = entries.iter().any(|e| e.release.is_in_same_group(release));
        if found {
            debug!(target: "history", %tracker, group_id = %group_id, "group already in history");
        }
        Ok(found)
    }

    pub async fn contains_torrent(&self, tracker: &str, torrent_id: TorrentId) -> Result<bool> {
        self.repository.contains_torrent(tracker, torrent_id).await
    }

    pub async fn record(
        &self,
        tracker: &str,
        filter: &str,
        release: &Release,
    ) -> Result<SnatchHistoryEntry> {
        self.repository
            .record(SnatchHistoryEntry::new(tracker, filter, release.clone()))
            .await
    }

    pub async fn list(&self, tracker: &str) -> Result<Vec<SnatchHistoryEntry>> {
        self.repository.list_by_tracker(tracker).await
    }
}
