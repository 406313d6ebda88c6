// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::{Context, Result};
use apiary_domain::{GroupId, Release, SnatchHistoryEntry, SnatchId, TorrentId};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::repositories::SnatchHistoryRepository;

/// SQLx-backed snatch history. The release is stored as JSON next to the
/// indexed columns used by dedupe lookups.
#[derive(Clone)]
pub struct SqliteSnatchHistoryRepository {
    pool: SqlitePool,
}

impl SqliteSnatchHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, tracker, filter, release_json, snatched_at FROM snatch_history";

#[async_trait::async_trait]
impl SnatchHistoryRepository for SqliteSnatchHistoryRepository {
    async fn record(&self, entry: SnatchHistoryEntry) -> Result<SnatchHistoryEntry> {
        debug!(target: "infrastructure", tracker = %entry.tracker, torrent_id = %entry.release.torrent_id, "recording snatch");
        let q = r#"
            INSERT INTO snatch_history (
                id, tracker, filter, torrent_id, group_id, primary_artist, release_json, snatched_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        let release_json = serde_json::to_string(&entry.release)?;
        sqlx::query(q)
            .bind(entry.id.to_string())
            .bind(&entry.tracker)
            .bind(&entry.filter)
            .bind(entry.release.torrent_id.0 as i64)
            .bind(entry.release.group_id.map(|g| g.0 as i64))
            .bind(entry.release.primary_artist())
            .bind(release_json)
            .bind(entry.snatched_at.to_rfc3339_opts(SecondsFormat::Micros, true))
            .execute(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn list_by_tracker(&self, tracker: &str) -> Result<Vec<SnatchHistoryEntry>> {
        let q = format!("{SELECT_COLUMNS} WHERE tracker = ? ORDER BY snatched_at, rowid");
        let rows = sqlx::query(&q)
            .bind(tracker)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn find_by_primary_artist(
        &self,
        tracker: &str,
        artist: &str,
    ) -> Result<Vec<SnatchHistoryEntry>> {
        let q = format!("{SELECT_COLUMNS} WHERE tracker = ? AND primary_artist = ? ORDER BY snatched_at, rowid");
        let rows = sqlx::query(&q)
            .bind(tracker)
            .bind(artist)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn find_by_group(
        &self,
        tracker: &str,
        group_id: GroupId,
    ) -> Result<Vec<SnatchHistoryEntry>> {
        let q = format!("{SELECT_COLUMNS} WHERE tracker = ? AND group_id = ? ORDER BY snatched_at, rowid");
        let rows = sqlx::query(&q)
            .bind(tracker)
            .bind(group_id.0 as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn contains_torrent(&self, tracker: &str, torrent_id: TorrentId) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS hits FROM snatch_history WHERE tracker = ? AND torrent_id = ?",
        )
        .bind(tracker)
        .bind(torrent_id.0 as i64)
        .fetch_one(&self.pool)
        .await?;
        let hits: i64 = row.try_get("hits")?;
        Ok(hits > 0)
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn parse_dt(s: String) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // SQLite CURRENT_TIMESTAMP format
    let ndt = NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<SnatchHistoryEntry> {
    let id_str: String = row.try_get("id")?;
    let tracker: String = row.try_get("tracker")?;
    let filter: String = row.try_get("filter")?;
    let release_json: String = row.try_get("release_json")?;
    let snatched_at: String = row.try_get("snatched_at")?;

    let release: Release = serde_json::from_str(&release_json)
        .with_context(|| format!("corrupt release in history entry {}", id_str))?;

    Ok(SnatchHistoryEntry {
        id: SnatchId::from_uuid(Uuid::parse_str(&id_str)?),
        tracker,
        filter,
        release,
        snatched_at: parse_dt(snatched_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect in-memory sqlite");

        sqlx::migrate!("../../migrations").run(&pool).await.expect("migrate");
        pool
    }

    fn release(artist: &str, torrent_id: u64, group_id: u64) -> Release {
        Release {
            artists: vec![artist.to_string()],
            title: "Title".to_string(),
            year: Some(2001),
            release_type: "Album".to_string(),
            format: "FLAC".to_string(),
            quality: "Lossless".to_string(),
            has_log: false,
            log_score: None,
            has_cue: false,
            is_scene: false,
            source: "WEB".to_string(),
            tags: vec!["rock".to_string()],
            url: String::new(),
            torrent_url: String::new(),
            torrent_id: TorrentId(torrent_id),
            group_id: Some(GroupId(group_id)),
            torrent_file: format!("{torrent_id}.torrent"),
            size: 1000,
            uploader: Some("up".to_string()),
            folder: None,
            filter: Some("f".to_string()),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_and_query_by_tracker_artist_and_group() {
        let pool = setup_pool().await;
        let repo = SqliteSnatchHistoryRepository::new(pool);

        let entry = SnatchHistoryEntry::new("blue", "f", release("Artist", 10, 1));
        let id = entry.id;
        repo.record(entry.clone()).await.expect("record");
        repo.record(SnatchHistoryEntry::new("blue", "f", release("Other", 11, 2)))
            .await
            .expect("record");
        repo.record(SnatchHistoryEntry::new("red", "f", release("Artist", 10, 1)))
            .await
            .expect("record");

        let blue = repo.list_by_tracker("blue").await.expect("list");
        assert_eq!(blue.len(), 2);
        assert_eq!(blue[0].id, id);
        assert_eq!(blue[0].release, entry.release);

        let by_artist = repo
            .find_by_primary_artist("blue", "Artist")
            .await
            .expect("by artist");
        assert_eq!(by_artist.len(), 1);
        assert_eq!(by_artist[0].release.torrent_id, TorrentId(10));

        let by_group = repo.find_by_group("blue", GroupId(2)).await.expect("by group");
        assert_eq!(by_group.len(), 1);
        assert_eq!(by_group[0].release.primary_artist(), "Other");

        assert!(repo.contains_torrent("blue", TorrentId(11)).await.unwrap());
        assert!(!repo.contains_torrent("red", TorrentId(11)).await.unwrap());
    }

    #[test]
    fn parses_sqlite_timestamps() {
        let dt = parse_dt("2026-10-16 12:30:00".to_string()).unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-10-16T12:30:00+00:00");
    }
}
