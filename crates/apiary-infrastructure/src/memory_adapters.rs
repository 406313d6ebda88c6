// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use anyhow::Result;
use apiary_domain::{GroupId, SnatchHistoryEntry, TorrentId};
use tokio::sync::RwLock;

use crate::repositories::SnatchHistoryRepository;

/// Snatch history kept in process memory. Lost on restart.
#[derive(Clone, Default)]
pub struct InMemorySnatchHistoryRepository {
    entries: Arc<RwLock<Vec<SnatchHistoryEntry>>>,
}

impl InMemorySnatchHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn select<F>(&self, tracker: &str, predicate: F) -> Vec<SnatchHistoryEntry>
    where
        F: Fn(&SnatchHistoryEntry) -> bool,
    {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.tracker == tracker && predicate(e))
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl SnatchHistoryRepository for InMemorySnatchHistoryRepository {
    async fn record(&self, entry: SnatchHistoryEntry) -> Result<SnatchHistoryEntry> {
        self.entries.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn list_by_tracker(&self, tracker: &str) -> Result<Vec<SnatchHistoryEntry>> {
        Ok(self.select(tracker, |_| true).await)
    }

    async fn find_by_primary_artist(
        &self,
        tracker: &str,
        artist: &str,
    ) -> Result<Vec<SnatchHistoryEntry>> {
        Ok(self
            .select(tracker, |e| e.release.primary_artist() == artist)
            .await)
    }

    async fn find_by_group(
        &self,
        tracker: &str,
        group_id: GroupId,
    ) -> Result<Vec<SnatchHistoryEntry>> {
        Ok(self
            .select(tracker, |e| e.release.group_id == Some(group_id))
            .await)
    }

    async fn contains_torrent(&self, tracker: &str, torrent_id: TorrentId) -> Result<bool> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .any(|e| e.tracker == tracker && e.release.torrent_id == torrent_id))
    }
}
