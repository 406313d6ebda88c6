// SPDX-License-Identifier: GPL-3.0-or-later
//! Two-stage filter evaluation.
//!
//! Stage one only looks at what the announce carried. Stage two runs once the
//! tracker metadata for the torrent has been fetched, and covers everything
//! the announce cannot tell: size, uploader, label, edition and the full
//! artist roster of compilations.

use apiary_domain::{Filter, Release, TrackerMetadata, FORMAT_FLAC};
use tracing::{debug, info};

const MIB: u64 = 1024 * 1024;

/// Stage one: does the announced release satisfy `filter`?
///
/// Criteria are checked in a fixed order and the first failure short-circuits.
/// Empty lists and unset scalars never reject.
pub fn satisfies(release: &Release, filter: &Filter) -> bool {
    if !filter.year.is_empty() && !release.year.is_some_and(|y| filter.year.contains(&y)) {
        return reject(filter, "year");
    }
    if !matches_any(&filter.format, &release.format) {
        return reject(filter, "format");
    }
    if !matches_any(&filter.source, &release.source) {
        return reject(filter, "source");
    }
    if !matches_any(&filter.quality, &release.quality) {
        return reject(filter, "quality");
    }
    if is_cd_flac(release) {
        if filter.has_log && !release.has_log {
            return reject(filter, "log");
        }
        // only a score present in the announce can fail here
        if let (Some(threshold), Some(score)) = (filter.log_score_threshold(), release.log_score) {
            if score < threshold {
                return reject(filter, "log score");
            }
        }
        if filter.has_cue && !release.has_cue {
            return reject(filter, "cue");
        }
    }
    if release.is_scene && !filter.allow_scene {
        return reject(filter, "scene");
    }
    if filter.excluded_release_type.contains(&release.release_type) {
        return reject(filter, "excluded release type");
    }
    if !matches_any(&filter.release_type, &release.release_type) {
        return reject(filter, "release type");
    }
    if release
        .tags
        .iter()
        .any(|tag| filter.excluded_tags.contains(tag))
    {
        return reject(filter, "excluded tag");
    }
    if !filter.included_tags.is_empty()
        && !release
            .tags
            .iter()
            .any(|tag| filter.included_tags.contains(tag))
    {
        return reject(filter, "no included tag");
    }
    true
}

/// Stage two: is the torrent, as described by the tracker, still wanted by `filter`?
pub fn has_compatible_metadata(
    release: &Release,
    filter: &Filter,
    blacklisted_uploaders: &[String],
    metadata: &TrackerMetadata,
) -> bool {
    if !filter.edition_year.is_empty()
        && !metadata
            .edition_year
            .is_some_and(|y| filter.edition_year.contains(&y))
    {
        return mismatch(filter, "edition year");
    }

    let size_mib = (metadata.size / MIB) as i64;
    if filter.min_size_mb.is_some_and(|min| size_mib < min) {
        return mismatch(filter, "too small");
    }
    if filter.max_size_mb.is_some_and(|max| size_mib > max) {
        return mismatch(filter, "too big");
    }

    if is_cd_flac(release) {
        if let Some(threshold) = filter.log_score_threshold() {
            if !metadata.log_score.is_some_and(|score| score >= threshold) {
                return mismatch(filter, "log score");
            }
        }
    }

    if !filter.record_label.is_empty()
        && !metadata
            .label
            .as_ref()
            .is_some_and(|label| filter.record_label.contains(label))
    {
        return mismatch(filter, "record label");
    }

    if !filter.edition.is_empty() {
        let edition = metadata
            .edition_name
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if !filter
            .edition
            .iter()
            .any(|candidate| edition.contains(&candidate.to_lowercase()))
        {
            return mismatch(filter, "edition");
        }
    }

    if let Some(uploader) = &metadata.uploader {
        if blacklisted_uploaders.contains(uploader)
            || filter.blacklisted_uploader.contains(uploader)
        {
            return mismatch(filter, "blacklisted uploader");
        }
    }
    if !filter.uploader.is_empty()
        && !metadata
            .uploader
            .as_ref()
            .is_some_and(|uploader| filter.uploader.contains(uploader))
    {
        return mismatch(filter, "uploader not whitelisted");
    }

    if filter.reject_unknown && metadata.catalog_number.is_none() && metadata.label.is_none() {
        return mismatch(filter, "unknown release");
    }

    if !filter.artist.is_empty() || !filter.excluded_artist.is_empty() {
        // the announce only says "Various Artists" for compilations
        let artists: Vec<&str> = if release.is_various_artists() {
            metadata.roster().collect()
        } else {
            release.artists.iter().map(String::as_str).collect()
        };
        if artists
            .iter()
            .any(|artist| filter.excluded_artist.iter().any(|e| e.as_str() == *artist))
        {
            return mismatch(filter, "excluded artist");
        }
        if !filter.artist.is_empty()
            && !artists
                .iter()
                .any(|artist| filter.artist.iter().any(|a| a.as_str() == *artist))
        {
            return mismatch(filter, "artist");
        }
    }
    true
}

/// Logs and cues only exist for FLAC rips of CDs.
fn is_cd_flac(release: &Release) -> bool {
    release.is_cd() && release.format == FORMAT_FLAC
}

fn matches_any(accepted: &[String], value: &str) -> bool {
    accepted.is_empty() || accepted.iter().any(|a| a == value)
}

fn reject(filter: &Filter, reason: &str) -> bool {
    debug!(target: "filters", filter = %filter.name, reason, "release rejected");
    false
}

fn mismatch(filter: &Filter, reason: &str) -> bool {
    info!(target: "filters", filter = %filter.name, reason, "tracker metadata does not match filter");
    false
}

/// Filters of one tracker, in configuration order.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    filters: Vec<Filter>,
    blacklisted_uploaders: Vec<String>,
}

impl FilterEngine {
    /// Keep the filters that apply to `tracker`.
    pub fn new(
        tracker: &str,
        filters: impl IntoIterator<Item = Filter>,
        blacklisted_uploaders: Vec<String>,
    ) -> Self {
        Self {
            filters: filters
                .into_iter()
                .filter(|f| f.applies_to_tracker(tracker))
                .collect(),
            blacklisted_uploaders,
        }
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Stage one against every filter. The first satisfied filter is recorded
    /// on the release.
    pub fn candidates(&self, release: &mut Release) -> Vec<&Filter> {
        let candidates: Vec<&Filter> = self
            .filters
            .iter()
            .filter(|filter| satisfies(release, filter))
            .collect();
        if let Some(first) = candidates.first() {
            release.filter = Some(first.name.clone());
        }
        candidates
    }

    /// Stage two. On success the authoritative fields are copied onto the release.
    pub fn accepts_metadata(
        &self,
        release: &mut Release,
        filter: &Filter,
        metadata: &TrackerMetadata,
    ) -> bool {
        if !has_compatible_metadata(release, filter, &self.blacklisted_uploaders, metadata) {
            return false;
        }
        release.apply_metadata(metadata);
        release.filter = Some(filter.name.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_domain::{ArtistCredit, ArtistRole, GroupId, TorrentId, VARIOUS_ARTISTS};

    fn release() -> Release {
        Release {
            artists: vec!["An artist".to_string()],
            title: "Title".to_string(),
            year: Some(2013),
            release_type: "Album".to_string(),
            format: "MP3".to_string(),
            quality: "320".to_string(),
            source: "CD".to_string(),
            tags: vec!["tag1.taggy".to_string(), "tag2.mctagface".to_string()],
            torrent_id: TorrentId(981243),
            ..Release::default()
        }
    }

    fn flac_cd(log_score: Option<i32>) -> Release {
        Release {
            format: "FLAC".to_string(),
            quality: "Lossless".to_string(),
            has_log: true,
            log_score,
            has_cue: true,
            ..release()
        }
    }

    fn metadata() -> TrackerMetadata {
        TrackerMetadata {
            id: TorrentId(981243),
            group_id: GroupId(93821),
            label: Some("Label".to_string()),
            catalog_number: Some("CAT-1".to_string()),
            edition_name: Some("Deluxe Edition".to_string()),
            edition_year: Some(2014),
            log_score: Some(100),
            size: 300 * MIB,
            uploader: Some("uploader".to_string()),
            folder: Some("An artist - Title".to_string()),
            ..TrackerMetadata::default()
        }
    }

    #[test]
    fn format_filter_matches_announce() {
        let filter = Filter {
            format: vec!["MP3".to_string()],
            ..Filter::new("mp3")
        };
        assert!(satisfies(&release(), &filter));
    }

    #[test]
    fn log_requirement_applies_to_cd_flac() {
        let filter = Filter {
            has_log: true,
            source: vec!["CD".to_string()],
            ..Filter::new("log")
        };
        let mut no_log = flac_cd(None);
        no_log.has_log = false;
        assert!(!satisfies(&no_log, &filter));
        assert!(satisfies(&flac_cd(None), &filter));

        let web = Release {
            source: "WEB".to_string(),
            ..release()
        };
        let any_source = Filter {
            has_log: true,
            ..Filter::new("log")
        };
        assert!(satisfies(&web, &any_source));
    }

    #[test]
    fn absent_log_score_never_fails_stage_one() {
        let filter = Filter {
            log_score: Some(100),
            ..Filter::new("perfect")
        };
        assert!(satisfies(&flac_cd(None), &filter));
        assert!(satisfies(&flac_cd(Some(100)), &filter));
        assert!(!satisfies(&flac_cd(Some(95)), &filter));
    }

    #[test]
    fn cd_mp3_skips_log_and_cue_checks() {
        let formats = vec!["FLAC".to_string(), "MP3".to_string()];
        let has_log = Filter {
            has_log: true,
            format: formats.clone(),
            ..Filter::new("log")
        };
        let score = Filter {
            log_score: Some(100),
            format: formats.clone(),
            ..Filter::new("score")
        };
        let has_cue = Filter {
            has_cue: true,
            format: formats,
            ..Filter::new("cue")
        };
        assert!(satisfies(&release(), &has_log));
        assert!(satisfies(&release(), &score));
        assert!(satisfies(&release(), &has_cue));

        let mut info = metadata();
        info.log_score = None;
        assert!(has_compatible_metadata(&release(), &score, &[], &info));
    }

    #[test]
    fn cue_requirement() {
        let filter = Filter {
            has_cue: true,
            ..Filter::new("cue")
        };
        let mut no_cue = flac_cd(Some(100));
        no_cue.has_cue = false;
        assert!(!satisfies(&no_cue, &filter));
        assert!(satisfies(&flac_cd(Some(100)), &filter));
    }

    #[test]
    fn scene_needs_permission() {
        let scene = Release {
            is_scene: true,
            ..release()
        };
        assert!(!satisfies(&scene, &Filter::new("f")));
        let filter = Filter {
            allow_scene: true,
            ..Filter::new("f")
        };
        assert!(satisfies(&scene, &filter));
    }

    #[test]
    fn year_requires_known_year() {
        let filter = Filter {
            year: vec![2013],
            ..Filter::new("f")
        };
        assert!(satisfies(&release(), &filter));
        let unknown = Release {
            year: None,
            ..release()
        };
        assert!(!satisfies(&unknown, &filter));
    }

    #[test]
    fn release_types_and_tags() {
        let excluded = Filter {
            excluded_release_type: vec!["Album".to_string()],
            ..Filter::new("f")
        };
        assert!(!satisfies(&release(), &excluded));

        let included = Filter {
            release_type: vec!["EP".to_string(), "Album".to_string()],
            included_tags: vec!["other".to_string(), "tag2.mctagface".to_string()],
            ..Filter::new("f")
        };
        assert!(satisfies(&release(), &included));

        let excluded_tag = Filter {
            included_tags: vec!["tag1.taggy".to_string()],
            excluded_tags: vec!["tag2.mctagface".to_string()],
            ..Filter::new("f")
        };
        assert!(!satisfies(&release(), &excluded_tag));

        let missing_tag = Filter {
            included_tags: vec!["jazz".to_string()],
            ..Filter::new("f")
        };
        assert!(!satisfies(&release(), &missing_tag));
    }

    #[test]
    fn size_bounds_are_inclusive() {
        let filter = Filter {
            min_size_mb: Some(300),
            max_size_mb: Some(300),
            ..Filter::new("f")
        };
        assert!(has_compatible_metadata(&release(), &filter, &[], &metadata()));

        let too_big = Filter {
            max_size_mb: Some(299),
            ..Filter::new("f")
        };
        assert!(!has_compatible_metadata(&release(), &too_big, &[], &metadata()));

        let too_small = Filter {
            min_size_mb: Some(301),
            ..Filter::new("f")
        };
        assert!(!has_compatible_metadata(&release(), &too_small, &[], &metadata()));
    }

    #[test]
    fn authoritative_log_score_is_enforced_for_cd() {
        let filter = Filter {
            log_score: Some(100),
            ..Filter::new("f")
        };
        let mut info = metadata();
        assert!(has_compatible_metadata(&flac_cd(None), &filter, &[], &info));
        info.log_score = Some(99);
        assert!(!has_compatible_metadata(&flac_cd(None), &filter, &[], &info));
        info.log_score = None;
        assert!(!has_compatible_metadata(&flac_cd(None), &filter, &[], &info));
    }

    #[test]
    fn label_edition_and_edition_year() {
        let filter = Filter {
            record_label: vec!["Label".to_string()],
            edition: vec!["remaster".to_string(), "DELUXE".to_string()],
            edition_year: vec![2014],
            ..Filter::new("f")
        };
        assert!(has_compatible_metadata(&release(), &filter, &[], &metadata()));

        let mut info = metadata();
        info.edition_name = None;
        assert!(!has_compatible_metadata(&release(), &filter, &[], &info));

        let mut info = metadata();
        info.label = Some("Other".to_string());
        assert!(!has_compatible_metadata(&release(), &filter, &[], &info));

        let mut info = metadata();
        info.edition_year = Some(2013);
        assert!(!has_compatible_metadata(&release(), &filter, &[], &info));
    }

    #[test]
    fn uploader_lists() {
        let global = vec!["uploader".to_string()];
        assert!(!has_compatible_metadata(&release(), &Filter::new("f"), &global, &metadata()));

        let per_filter = Filter {
            blacklisted_uploader: vec!["uploader".to_string()],
            ..Filter::new("f")
        };
        assert!(!has_compatible_metadata(&release(), &per_filter, &[], &metadata()));

        let whitelist = Filter {
            uploader: vec!["friend".to_string()],
            ..Filter::new("f")
        };
        assert!(!has_compatible_metadata(&release(), &whitelist, &[], &metadata()));
        let mut info = metadata();
        info.uploader = Some("friend".to_string());
        assert!(has_compatible_metadata(&release(), &whitelist, &[], &info));
    }

    #[test]
    fn reject_unknown_needs_label_or_catalog_number() {
        let filter = Filter {
            reject_unknown: true,
            ..Filter::new("f")
        };
        let mut info = metadata();
        info.label = None;
        assert!(has_compatible_metadata(&release(), &filter, &[], &info));
        info.catalog_number = None;
        assert!(!has_compatible_metadata(&release(), &filter, &[], &info));
    }

    #[test]
    fn various_artists_are_matched_against_roster() {
        let compilation = Release {
            artists: vec![VARIOUS_ARTISTS.to_string()],
            ..release()
        };
        let mut info = metadata();
        info.artists = vec![
            ArtistCredit {
                id: 1,
                name: "Wanted".to_string(),
                role: ArtistRole::Guest,
            },
            ArtistCredit {
                id: 2,
                name: "Producer".to_string(),
                role: ArtistRole::Producer,
            },
        ];

        let wanted = Filter {
            artist: vec!["Wanted".to_string()],
            ..Filter::new("f")
        };
        assert!(has_compatible_metadata(&compilation, &wanted, &[], &info));

        let producer_only = Filter {
            artist: vec!["Producer".to_string()],
            ..Filter::new("f")
        };
        assert!(!has_compatible_metadata(&compilation, &producer_only, &[], &info));

        let excluded = Filter {
            excluded_artist: vec!["Wanted".to_string()],
            ..Filter::new("f")
        };
        assert!(!has_compatible_metadata(&compilation, &excluded, &[], &info));
    }

    #[test]
    fn regular_releases_use_announced_artists() {
        let filter = Filter {
            artist: vec!["An artist".to_string()],
            ..Filter::new("f")
        };
        assert!(has_compatible_metadata(&release(), &filter, &[], &metadata()));

        let other = Filter {
            artist: vec!["Someone else".to_string()],
            ..Filter::new("f")
        };
        assert!(!has_compatible_metadata(&release(), &other, &[], &metadata()));
    }

    #[test]
    fn engine_keeps_tracker_filters_in_order() {
        let filters = vec![
            Filter {
                format: vec!["FLAC".to_string()],
                ..Filter::new("flac")
            },
            Filter {
                tracker: vec!["red".to_string()],
                ..Filter::new("red only")
            },
            Filter {
                format: vec!["MP3".to_string()],
                ..Filter::new("mp3")
            },
            Filter {
                quality: vec!["320".to_string()],
                ..Filter::new("320")
            },
        ];
        let engine = FilterEngine::new("blue", filters, vec![]);
        assert_eq!(engine.filters().len(), 3);

        let mut r = release();
        let names: Vec<&str> = engine
            .candidates(&mut r)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["mp3", "320"]);
        assert_eq!(r.filter.as_deref(), Some("mp3"));
    }

    #[test]
    fn accepted_metadata_is_applied() {
        let engine = FilterEngine::new("blue", vec![Filter::new("f")], vec![]);
        let filter = engine.filters()[0].clone();
        let mut r = release();
        assert!(engine.accepts_metadata(&mut r, &filter, &metadata()));
        assert_eq!(r.size, 300 * MIB);
        assert_eq!(r.group_id, Some(GroupId(93821)));
        assert_eq!(r.uploader.as_deref(), Some("uploader"));
        assert_eq!(r.filter.as_deref(), Some("f"));
    }
}
