// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use apiary_domain::{Release, SnatchOrigin, TorrentId};
use apiary_gazelle::{GazelleError, TrackerApi};
use apiary_notify::{NotificationSink, Severity};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::filtering::FilterEngine;
use crate::history::SnatchHistory;
use crate::release_parsing::{AnnounceParser, ReleaseBuilder, ReleaseError};

#[derive(Debug, Error)]
pub enum SnatchError {
    #[error(transparent)]
    Release(#[from] ReleaseError),
    #[error(transparent)]
    Tracker(#[from] GazelleError),
    #[error("snatch history lookup failed: {0}")]
    History(String),
    #[error("torrent {0} was already snatched")]
    AlreadySnatched(TorrentId),
}

/// A downloaded torrent.
#[derive(Debug, Clone)]
pub struct Snatch {
    pub release: Release,
    pub filter: String,
    pub path: PathBuf,
}

/// What became of one announce.
#[derive(Debug)]
pub enum AnnounceOutcome {
    /// The line did not parse as a music announce.
    NotMusic,
    /// No filter passed stage one.
    NoCandidate,
    /// Stage-one candidates all failed against the tracker metadata.
    NoMatch,
    RejectedDuplicate { filter: String },
    RejectedSameGroup { filter: String },
    AlreadySnatched(TorrentId),
    Snatched(Snatch),
}

/// Async locks keyed by tracker and torrent ID.
///
/// Entries are dropped once nobody holds or waits for them.
#[derive(Clone, Default)]
pub struct TorrentLocks {
    inner: Arc<Mutex<HashMap<(String, TorrentId), Weak<AsyncMutex<()>>>>>,
}

impl TorrentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, tracker: &str, torrent_id: TorrentId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| lock.strong_count() > 0);
            let key = (tracker.to_string(), torrent_id);
            match locks.get(&key).and_then(Weak::upgrade) {
                Some(mutex) => mutex,
                None => {
                    let mutex = Arc::new(AsyncMutex::new(()));
                    locks.insert(key, Arc::downgrade(&mutex));
                    mutex
                }
            }
        };
        mutex.lock_owned().await
    }
}

/// Runs announces and snatch requests for one tracker through the pipeline:
/// stage-one filtering, metadata fetch, stage-two filtering, dedupe,
/// download, history and notification.
pub struct SnatchCoordinator {
    tracker: Arc<dyn TrackerApi>,
    engine: FilterEngine,
    history: SnatchHistory,
    notifier: Arc<dyn NotificationSink>,
    watch_dir: PathBuf,
    locks: TorrentLocks,
}

impl SnatchCoordinator {
    pub fn new(
        tracker: Arc<dyn TrackerApi>,
        engine: FilterEngine,
        history: SnatchHistory,
        notifier: Arc<dyn NotificationSink>,
        watch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tracker,
            engine,
            history,
            notifier,
            watch_dir: watch_dir.into(),
            locks: TorrentLocks::new(),
        }
    }

    /// Share torrent locks with other coordinators of the same tracker.
    pub fn with_locks(mut self, locks: TorrentLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn tracker(&self) -> &Arc<dyn TrackerApi> {
        &self.tracker
    }

    pub fn tracker_name(&self) -> &str {
        self.tracker.name()
    }

    pub fn engine(&self) -> &FilterEngine {
        &self.engine
    }

    pub async fn handle_announce(&self, line: &str) -> Result<AnnounceOutcome, SnatchError> {
        let tracker = self.tracker.name();
        let Some(captures) = AnnounceParser::parse(line) else {
            debug!(target: "announce", %tracker, %line, "not a music announce");
            return Ok(AnnounceOutcome::NotMusic);
        };
        let mut release = ReleaseBuilder::build(&captures)?;
        debug!(target: "announce", %tracker, torrent_id = %release.torrent_id, "announce parsed:\n{}", release);

        let candidates = self.engine.candidates(&mut release);
        if candidates.is_empty() {
            debug!(target: "coordinator", %tracker, torrent_id = %release.torrent_id, "no filter is interested in that release");
            return Ok(AnnounceOutcome::NoCandidate);
        }

        let _guard = self.locks.lock(tracker, release.torrent_id).await;
        if self.already_snatched(release.torrent_id).await? {
            debug!(target: "coordinator", %tracker, torrent_id = %release.torrent_id, "torrent already snatched");
            return Ok(AnnounceOutcome::AlreadySnatched(release.torrent_id));
        }

        // one lookup serves every remaining candidate
        let metadata = self.tracker.fetch_metadata(release.torrent_id).await?;

        let mut rejection = None;
        for filter in candidates {
            if !self.engine.accepts_metadata(&mut release, filter, &metadata) {
                continue;
            }
            if !filter.allow_duplicates
                && self
                    .history
                    .already_snatched_duplicate(tracker, &release)
                    .await
                    .map_err(|e| SnatchError::History(e.to_string()))?
            {
                info!(target: "coordinator", %tracker, filter = %filter.name, torrent_id = %release.torrent_id, "similar release already downloaded, and duplicates are not allowed");
                rejection.get_or_insert(AnnounceOutcome::RejectedDuplicate {
                    filter: filter.name.clone(),
                });
                continue;
            }
            if filter.unique_in_group
                && self
                    .history
                    .already_snatched_from_group(tracker, &release)
                    .await
                    .map_err(|e| SnatchError::History(e.to_string()))?
            {
                info!(target: "coordinator", %tracker, filter = %filter.name, torrent_id = %release.torrent_id, "release from the same group already downloaded");
                rejection.get_or_insert(AnnounceOutcome::RejectedSameGroup {
                    filter: filter.name.clone(),
                });
                continue;
            }

            info!(target: "coordinator", %tracker, filter = %filter.name, release = %release.short_string(), "filter triggered, snatching");
            let destination = filter.watch_dir.as_deref().unwrap_or(&self.watch_dir);
            let snatch = self.snatch(release, &filter.name, destination).await?;
            return Ok(AnnounceOutcome::Snatched(snatch));
        }

        Ok(rejection.unwrap_or(AnnounceOutcome::NoMatch))
    }

    /// Snatch a torrent requested by ID, bypassing filters.
    pub async fn snatch_by_id(
        &self,
        torrent_id: TorrentId,
        origin: SnatchOrigin,
    ) -> Result<Snatch, SnatchError> {
        let tracker = self.tracker.name();
        let _guard = self.locks.lock(tracker, torrent_id).await;
        if self.already_snatched(torrent_id).await? {
            return Err(SnatchError::AlreadySnatched(torrent_id));
        }

        let metadata = self.tracker.fetch_metadata(torrent_id).await?;
        let release = ReleaseBuilder::from_metadata(
            &metadata,
            self.tracker.group_url(metadata.group_id),
            self.tracker.download_url(torrent_id),
        );
        info!(target: "coordinator", %tracker, %origin, release = %release.short_string(), "snatching on request");
        self.snatch(release, origin.filter_name(), &self.watch_dir)
            .await
    }

    async fn already_snatched(&self, torrent_id: TorrentId) -> Result<bool, SnatchError> {
        self.history
            .contains_torrent(self.tracker.name(), torrent_id)
            .await
            .map_err(|e| SnatchError::History(e.to_string()))
    }

    async fn snatch(
        &self,
        mut release: Release,
        filter: &str,
        destination: &Path,
    ) -> Result<Snatch, SnatchError> {
        let tracker = self.tracker.name();
        let path = self
            .tracker
            .download(&release.torrent_url, destination, &release.torrent_file)
            .await?;
        release.filter = Some(filter.to_string());
        info!(target: "coordinator", %tracker, %filter, path = %path.display(), "torrent downloaded");

        if let Err(e) = self.history.record(tracker, filter, &release).await {
            error!(target: "history", %tracker, torrent_id = %release.torrent_id, error = %e, "error adding release to history");
        }

        self.notifier
            .send(
                &format!("{}: Snatched {}", filter, release.short_string()),
                Severity::Info,
            )
            .await;

        Ok(Snatch {
            release,
            filter: filter.to_string(),
            path,
        })
    }
}
