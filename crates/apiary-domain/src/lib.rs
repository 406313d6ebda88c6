// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

// ============================================================================
// Tracker vocabulary
// ============================================================================

pub const VARIOUS_ARTISTS: &str = "Various Artists";
pub const SOURCE_CD: &str = "CD";
pub const FORMAT_FLAC: &str = "FLAC";
pub const QUALITY_LOSSLESS: &str = "Lossless";
pub const QUALITY_24BIT_LOSSLESS: &str = "24bit Lossless";

pub const KNOWN_RELEASE_TYPES: &[&str] = &[
    "Album",
    "Soundtrack",
    "EP",
    "Anthology",
    "Compilation",
    "Single",
    "Live album",
    "Remix",
    "Bootleg",
    "Interview",
    "Mixtape",
    "Demo",
    "Concert Recording",
    "DJ Mix",
    "Unknown",
];

pub const KNOWN_FORMATS: &[&str] = &["FLAC", "MP3", "AAC", "AC3", "DTS"];

pub const KNOWN_SOURCES: &[&str] = &[
    "CD",
    "DVD",
    "Vinyl",
    "Soundboard",
    "SACD",
    "DAT",
    "Cassette",
    "WEB",
    "Blu-Ray",
];

pub const KNOWN_QUALITIES: &[&str] = &[
    "192",
    "APS (VBR)",
    "V2 (VBR)",
    "V1 (VBR)",
    "256",
    "APX (VBR)",
    "V0 (VBR)",
    "320",
    "Lossless",
    "24bit Lossless",
    "Other",
];

/// Name of the release type behind the numeric code used by the tracker API.
pub fn release_type_name(code: i64) -> &'static str {
    match code {
        1 => "Album",
        3 => "Soundtrack",
        5 => "EP",
        6 => "Anthology",
        7 => "Compilation",
        9 => "Single",
        11 => "Live album",
        13 => "Remix",
        14 => "Bootleg",
        15 => "Interview",
        16 => "Mixtape",
        17 => "Demo",
        18 => "Concert Recording",
        19 => "DJ Mix",
        _ => "Unknown",
    }
}

// ============================================================================
// Value Objects & IDs
// ============================================================================

/// Numeric torrent ID as assigned by the tracker.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TorrentId(pub u64);

impl std::fmt::Display for TorrentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TorrentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Numeric torrent group ID as assigned by the tracker.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GroupId(pub u64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnatchId(pub Uuid);

impl SnatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SnatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtistRole {
    Main,
    Guest,
    Composer,
    Conductor,
    Dj,
    Producer,
    Remixer,
}

impl std::fmt::Display for ArtistRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Guest => write!(f, "guest"),
            Self::Composer => write!(f, "composer"),
            Self::Conductor => write!(f, "conductor"),
            Self::Dj => write!(f, "dj"),
            Self::Producer => write!(f, "producer"),
            Self::Remixer => write!(f, "remixer"),
        }
    }
}

/// Who asked for a snatch that did not come from a filter match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnatchOrigin {
    Manual,
    Remote,
}

impl SnatchOrigin {
    /// Filter name recorded in history for snatches of this origin.
    pub fn filter_name(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for SnatchOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filter_name())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A release as announced by a tracker, enriched after metadata lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Announced artists; the first one is the primary artist.
    pub artists: Vec<String>,
    pub title: String,
    pub year: Option<i32>,
    pub release_type: String,
    pub format: String,
    pub quality: String,
    pub has_log: bool,
    pub log_score: Option<i32>,
    pub has_cue: bool,
    pub is_scene: bool,
    pub source: String,
    pub tags: Vec<String>,
    pub url: String,
    pub torrent_url: String,
    pub torrent_id: TorrentId,
    pub group_id: Option<GroupId>,
    /// Sanitized file name for the downloaded .torrent.
    pub torrent_file: String,
    /// Size in bytes, known once tracker metadata has been applied.
    pub size: u64,
    pub uploader: Option<String>,
    pub folder: Option<String>,
    /// Name of the filter that led to this release being snatched.
    pub filter: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Release {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or_default()
    }

    pub fn is_various_artists(&self) -> bool {
        self.primary_artist() == VARIOUS_ARTISTS
    }

    pub fn is_cd(&self) -> bool {
        self.source == SOURCE_CD
    }

    /// Two releases are duplicates when they are the same edition in the same
    /// encoding. Log and cue details only matter for CD rips.
    pub fn is_duplicate(&self, other: &Release) -> bool {
        let same = self.primary_artist() == other.primary_artist()
            && self.title == other.title
            && self.year == other.year
            && self.release_type == other.release_type
            && self.quality == other.quality
            && self.source == other.source
            && self.format == other.format
            && self.is_scene == other.is_scene;
        if !same {
            return false;
        }
        if self.is_cd() {
            return self.has_log == other.has_log
                && self.log_score == other.log_score
                && self.has_cue == other.has_cue;
        }
        true
    }

    pub fn is_in_same_group(&self, other: &Release) -> bool {
        matches!((self.group_id, other.group_id), (Some(a), Some(b)) if a == b)
    }

    /// Copy the authoritative fields fetched from the tracker.
    pub fn apply_metadata(&mut self, metadata: &TrackerMetadata) {
        self.size = metadata.size;
        self.log_score = metadata.log_score;
        self.uploader = metadata.uploader.clone();
        self.folder = metadata.folder.clone();
        self.group_id = Some(metadata.group_id);
    }

    /// One-line description used in notifications.
    pub fn short_string(&self) -> String {
        format!(
            "{} - {} ({}) [{}/{}/{}/{}] [{}]",
            self.primary_artist(),
            self.title,
            self.year.map(|y| y.to_string()).unwrap_or_else(|| "?".to_string()),
            self.release_type,
            self.format,
            self.quality,
            self.source,
            format_size(self.size)
        )
    }
}

impl std::fmt::Display for Release {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Artist: {}", self.artists.join(", "))?;
        writeln!(f, "Title: {}", self.title)?;
        match self.year {
            Some(year) => writeln!(f, "Year: {}", year)?,
            None => writeln!(f, "Year: unknown")?,
        }
        writeln!(f, "Release Type: {}", self.release_type)?;
        writeln!(f, "Format: {}", self.format)?;
        writeln!(f, "Quality: {}", self.quality)?;
        writeln!(f, "Has Log: {}", self.has_log)?;
        if let Some(score) = self.log_score {
            writeln!(f, "Log Score: {}", score)?;
        }
        writeln!(f, "Has Cue: {}", self.has_cue)?;
        writeln!(f, "Scene: {}", self.is_scene)?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Tags: {}", self.tags.join(", "))?;
        writeln!(f, "URL: {}", self.url)?;
        writeln!(f, "Torrent URL: {}", self.torrent_url)?;
        write!(f, "Torrent ID: {}", self.torrent_id)
    }
}

/// Human readable size with binary units, e.g. `312 MiB` or `1.4 GiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if value < 10.0 {
        format!("{:.1} {}", value, UNITS[unit])
    } else {
        format!("{:.0} {}", value, UNITS[unit])
    }
}

/// A user-defined rule deciding which announced releases get snatched.
///
/// List criteria are OR within a field and AND across fields; an empty list
/// or unset scalar does not constrain anything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    pub name: String,
    pub year: Vec<i32>,
    pub edition_year: Vec<i32>,
    pub format: Vec<String>,
    pub source: Vec<String>,
    pub quality: Vec<String>,
    #[serde(alias = "type")]
    pub release_type: Vec<String>,
    #[serde(alias = "excluded_type")]
    pub excluded_release_type: Vec<String>,
    pub included_tags: Vec<String>,
    pub excluded_tags: Vec<String>,
    pub artist: Vec<String>,
    pub excluded_artist: Vec<String>,
    pub record_label: Vec<String>,
    /// Candidate substrings of the edition name, matched case-insensitively.
    pub edition: Vec<String>,
    pub has_log: bool,
    pub has_cue: bool,
    pub log_score: Option<i32>,
    pub allow_scene: bool,
    pub allow_duplicates: bool,
    pub unique_in_group: bool,
    #[serde(alias = "reject_unknown_releases")]
    pub reject_unknown: bool,
    pub min_size_mb: Option<i64>,
    pub max_size_mb: Option<i64>,
    /// Uploader whitelist.
    pub uploader: Vec<String>,
    pub blacklisted_uploader: Vec<String>,
    pub perfect_flac: bool,
    #[serde(alias = "watch_directory")]
    pub watch_dir: Option<PathBuf>,
    /// Trackers this filter applies to; empty means all of them.
    pub tracker: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Configured log score threshold, zero meaning none.
    pub fn log_score_threshold(&self) -> Option<i32> {
        self.log_score.filter(|score| *score != 0)
    }

    pub fn applies_to_tracker(&self, tracker: &str) -> bool {
        self.tracker.is_empty() || self.tracker.iter().any(|t| t == tracker)
    }

    /// Whether the filter restricts anything at all.
    pub fn has_criteria(&self) -> bool {
        !(self.year.is_empty()
            && self.edition_year.is_empty()
            && self.format.is_empty()
            && self.source.is_empty()
            && self.quality.is_empty()
            && self.release_type.is_empty()
            && self.excluded_release_type.is_empty()
            && self.included_tags.is_empty()
            && self.excluded_tags.is_empty()
            && self.artist.is_empty()
            && self.excluded_artist.is_empty()
            && self.record_label.is_empty()
            && self.edition.is_empty()
            && self.uploader.is_empty()
            && self.blacklisted_uploader.is_empty()
            && !self.has_log
            && !self.has_cue
            && self.log_score_threshold().is_none()
            && self.min_size_mb.is_none()
            && self.max_size_mb.is_none()
            && !self.unique_in_group
            && !self.reject_unknown
            && !self.perfect_flac)
    }
}

/// An artist as credited on a tracker torrent group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistCredit {
    pub id: u64,
    pub name: String,
    pub role: ArtistRole,
}

/// Authoritative information about one torrent, fetched from the tracker API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerMetadata {
    pub id: TorrentId,
    pub group_id: GroupId,
    pub title: String,
    pub year: Option<i32>,
    pub release_type: String,
    pub artists: Vec<ArtistCredit>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub edition_name: Option<String>,
    pub edition_year: Option<i32>,
    pub format: String,
    pub quality: String,
    pub source: String,
    pub has_log: bool,
    pub log_score: Option<i32>,
    pub has_cue: bool,
    pub is_scene: bool,
    pub size: u64,
    pub uploader: Option<String>,
    pub folder: Option<String>,
    pub seeders: u32,
    pub tags: Vec<String>,
}

impl TrackerMetadata {
    /// Artists that count as performers of the release: main, guest and composer credits.
    pub fn roster(&self) -> impl Iterator<Item = &str> {
        self.artists
            .iter()
            .filter(|credit| {
                matches!(
                    credit.role,
                    ArtistRole::Main | ArtistRole::Guest | ArtistRole::Composer
                )
            })
            .map(|credit| credit.name.as_str())
    }

    pub fn main_artists(&self) -> Vec<String> {
        self.artists
            .iter()
            .filter(|credit| credit.role == ArtistRole::Main)
            .map(|credit| credit.name.clone())
            .collect()
    }
}

/// A past snatch, stored append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnatchHistoryEntry {
    pub id: SnatchId,
    pub tracker: String,
    pub filter: String,
    pub release: Release,
    pub snatched_at: DateTime<Utc>,
}

impl SnatchHistoryEntry {
    pub fn new(tracker: impl Into<String>, filter: impl Into<String>, release: Release) -> Self {
        Self {
            id: SnatchId::new(),
            tracker: tracker.into(),
            filter: filter.into(),
            release,
            snatched_at: Utc::now(),
        }
    }
}

/// One raw announce line received from a tracker's announce channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceEvent {
    pub tracker: String,
    pub line: String,
}
