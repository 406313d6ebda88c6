// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::{Path, PathBuf};

use apiary_domain::{GroupId, TorrentId, TrackerMetadata};
use async_trait::async_trait;

use crate::client::{GazelleClient, SessionState};
use crate::error::Result;

/// The tracker operations the snatch pipeline relies on.
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Configured tracker name, used as the history key.
    fn name(&self) -> &str;

    async fn is_logged_in(&self) -> bool;

    async fn login(&self) -> Result<()>;

    async fn fetch_metadata(&self, id: TorrentId) -> Result<TrackerMetadata>;

    async fn download(&self, url: &str, destination: &Path, filename: &str) -> Result<PathBuf>;

    fn download_url(&self, id: TorrentId) -> String;

    fn group_url(&self, id: GroupId) -> String;
}

#[async_trait]
impl TrackerApi for GazelleClient {
    fn name(&self) -> &str {
        GazelleClient::name(self)
    }

    async fn is_logged_in(&self) -> bool {
        self.session_state().await == SessionState::LoggedIn
    }

    async fn login(&self) -> Result<()> {
        GazelleClient::login(self).await
    }

    async fn fetch_metadata(&self, id: TorrentId) -> Result<TrackerMetadata> {
        GazelleClient::fetch_metadata(self, id).await
    }

    async fn download(&self, url: &str, destination: &Path, filename: &str) -> Result<PathBuf> {
        GazelleClient::download(self, url, destination, filename).await
    }

    fn download_url(&self, id: TorrentId) -> String {
        GazelleClient::download_url(self, id)
    }

    fn group_url(&self, id: GroupId) -> String {
        GazelleClient::group_url(self, id)
    }
}
