// SPDX-License-Identifier: GPL-3.0-or-later

use apiary_domain::{
    release_type_name, ArtistCredit, ArtistRole, GroupId, TorrentId, TrackerMetadata,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{GazelleError, Result};

pub const STATUS_SUCCESS: &str = "success";

/// Envelope wrapping every JSON API response.
#[derive(Debug, Clone, Deserialize)]
pub struct GazelleEnvelope {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub response: serde_json::Value,
}

impl GazelleEnvelope {
    /// Unwrap the payload, turning a failure status into the matching error.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        if self.status == STATUS_SUCCESS {
            return serde_json::from_value(self.response).map_err(|e| {
                GazelleError::InvalidResponse(format!("failed to parse response: {}", e))
            });
        }
        if self.status.is_empty() {
            return Err(GazelleError::InvalidResponse(
                "missing status, maybe log in again?".to_string(),
            ));
        }

        let message = self.error.unwrap_or(self.status);
        if message.to_lowercase().contains("rate limit exceeded") {
            return Err(GazelleError::RateLimitExceeded);
        }
        Err(GazelleError::Api(message))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentResponse {
    pub group: TorrentGroup,
    pub torrent: TorrentDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentGroup {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub record_label: String,
    #[serde(default)]
    pub catalogue_number: String,
    #[serde(default)]
    pub release_type: i64,
    #[serde(default)]
    pub music_info: Option<MusicInfo>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MusicInfo {
    pub artists: Vec<ArtistRef>,
    pub with: Vec<ArtistRef>,
    pub composers: Vec<ArtistRef>,
    pub conductor: Vec<ArtistRef>,
    pub dj: Vec<ArtistRef>,
    pub producer: Vec<ArtistRef>,
    pub remixed_by: Vec<ArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentDetails {
    pub id: u64,
    #[serde(default)]
    pub media: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub remastered: bool,
    #[serde(default)]
    pub remaster_year: i32,
    #[serde(default)]
    pub remaster_title: String,
    #[serde(default)]
    pub remaster_record_label: String,
    #[serde(default)]
    pub remaster_catalogue_number: String,
    #[serde(default)]
    pub scene: bool,
    #[serde(default)]
    pub has_log: bool,
    #[serde(default)]
    pub log_score: i32,
    #[serde(default)]
    pub has_cue: bool,
    #[serde(default)]
    pub seeders: u32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub file_path: String,
    /// A string, or something else entirely when the uploader is anonymous.
    #[serde(default)]
    pub username: serde_json::Value,
}

impl TorrentResponse {
    pub fn into_metadata(self) -> TrackerMetadata {
        let TorrentResponse { group, torrent } = self;

        let mut artists = Vec::new();
        if let Some(info) = &group.music_info {
            let roles = [
                (&info.artists, ArtistRole::Main),
                (&info.with, ArtistRole::Guest),
                (&info.composers, ArtistRole::Composer),
                (&info.conductor, ArtistRole::Conductor),
                (&info.dj, ArtistRole::Dj),
                (&info.producer, ArtistRole::Producer),
                (&info.remixed_by, ArtistRole::Remixer),
            ];
            for (credits, role) in roles {
                artists.extend(credits.iter().map(|a| ArtistCredit {
                    id: a.id,
                    name: unescape_html(&a.name),
                    role,
                }));
            }
        }

        let (label, catalog_number) = if torrent.remastered {
            (&torrent.remaster_record_label, &torrent.remaster_catalogue_number)
        } else {
            (&group.record_label, &group.catalogue_number)
        };
        let edition_year = if torrent.remastered && torrent.remaster_year > 0 {
            Some(torrent.remaster_year)
        } else {
            positive(group.year)
        };

        TrackerMetadata {
            id: TorrentId(torrent.id),
            group_id: GroupId(group.id),
            title: unescape_html(&group.name),
            year: positive(group.year),
            release_type: release_type_name(group.release_type).to_string(),
            artists,
            label: non_empty(label),
            catalog_number: non_empty(catalog_number),
            edition_name: non_empty(&torrent.remaster_title),
            edition_year,
            format: torrent.format,
            quality: torrent.encoding,
            source: torrent.media,
            has_log: torrent.has_log,
            log_score: torrent.has_log.then_some(torrent.log_score),
            has_cue: torrent.has_cue,
            is_scene: torrent.scene,
            size: torrent.size,
            uploader: torrent
                .username
                .as_str()
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            folder: non_empty(&torrent.file_path),
            seeders: torrent.seeders,
            tags: group.tags,
        }
    }
}

fn positive(year: i32) -> Option<i32> {
    (year > 0).then_some(year)
}

fn non_empty(value: &str) -> Option<String> {
    let value = unescape_html(value.trim());
    (!value.is_empty()).then_some(value)
}

/// The API returns HTML-escaped text fields.
pub fn unescape_html(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
