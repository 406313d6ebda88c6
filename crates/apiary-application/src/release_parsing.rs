// SPDX-License-Identifier: GPL-3.0-or-later
use apiary_domain::{
    GroupId, Release, TorrentId, TrackerMetadata, KNOWN_FORMATS, KNOWN_QUALITIES,
    KNOWN_RELEASE_TYPES, KNOWN_SOURCES, VARIOUS_ARTISTS,
};
use chrono::Utc;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::trace;

/// Number of positional fields produced for every parsed announce, the full
/// match included.
pub const ANNOUNCE_FIELDS: usize = 19;

const ARTIST: usize = 1;
const TITLE: usize = 2;
const YEAR: usize = 3;
const RELEASE_TYPE: usize = 4;
const FORMAT: usize = 5;
const QUALITY: usize = 6;
const LOG: usize = 8;
const LOG_SCORE: usize = 10;
const CUE: usize = 12;
const SOURCE: usize = 13;
const SCENE: usize = 15;
const GROUP_URL: usize = 16;
const DOWNLOAD_URL: usize = 17;
const TAGS: usize = 18;

const URL_GROUP: &str = r"(https?://[\w./:]*torrents\.php\?id=\d+)";
const URL_DOWNLOAD: &str = r"(https?://[\w./:]*torrents\.php\?action=download&id=\d+[^\s]*)";
const TAG_LIST: &str = r"([\w., ]*)";

lazy_static! {
    static ref PRIMARY_ANNOUNCE: Regex = Regex::new(&format!(
        r"(.*?) - (.*) {}{} / {} - {}",
        release_block(),
        URL_GROUP,
        URL_DOWNLOAD,
        TAG_LIST
    ))
    .expect("valid primary announce regex");
    static ref ALTERNATIVE_ANNOUNCE: Regex = Regex::new(&format!(
        r"(.*?) - (.*) {}{} - {} / {}",
        release_block(),
        TAG_LIST,
        URL_GROUP,
        URL_DOWNLOAD
    ))
    .expect("valid alternative announce regex");
    static ref TORRENT_ID: Regex =
        Regex::new(r"torrents\.php\?action=download&id=(\d+)").expect("valid torrent id regex");
    static ref GROUP_ID: Regex =
        Regex::new(r"torrents\.php\?id=(\d+)").expect("valid group id regex");
    static ref ARTIST_SEPARATOR: Regex =
        Regex::new(r" & | performed by ").expect("valid artist separator regex");
}

/// `[YEAR] [TYPE] - FORMAT / QUALITY / [Log /] [NN% /] [Cue /] SOURCE [/ Scene] - `
fn release_block() -> String {
    format!(
        r"\[(\d*)\] \[({})\] - ({}) / ({}) /( (Log) /)?( (-?\d+)% /)?( (Cue) /)? ({}) (/ (Scene) )?- ",
        alternatives(KNOWN_RELEASE_TYPES),
        alternatives(KNOWN_FORMATS),
        alternatives(KNOWN_QUALITIES),
        alternatives(KNOWN_SOURCES)
    )
}

fn alternatives(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| regex::escape(value))
        .collect::<Vec<_>>()
        .join("|")
}

/// Which announce layout a line was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceGrammar {
    /// Tags come last, after the two URLs.
    Primary,
    /// Tags come between the release flags and the URLs.
    Alternative,
}

/// Positional fields of one announce, always laid out like the primary grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceCaptures {
    fields: Vec<String>,
    grammar: AnnounceGrammar,
}

impl AnnounceCaptures {
    fn from_captures(captures: &Captures<'_>, grammar: AnnounceGrammar) -> Self {
        let fields = (0..ANNOUNCE_FIELDS)
            .map(|slot| {
                let group = match (grammar, slot) {
                    (AnnounceGrammar::Alternative, GROUP_URL) => 17,
                    (AnnounceGrammar::Alternative, DOWNLOAD_URL) => 18,
                    (AnnounceGrammar::Alternative, TAGS) => 16,
                    _ => slot,
                };
                captures
                    .get(group)
                    .map_or_else(String::new, |m| m.as_str().to_string())
            })
            .collect();
        Self { fields, grammar }
    }

    pub fn grammar(&self) -> AnnounceGrammar {
        self.grammar
    }

    /// Field at `slot`, empty when the optional group did not participate.
    pub fn get(&self, slot: usize) -> &str {
        self.fields.get(slot).map(String::as_str).unwrap_or_default()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

pub struct AnnounceParser;

impl AnnounceParser {
    /// Parse an announce with control codes already stripped. `None` means the
    /// line is not a music announce.
    pub fn parse(line: &str) -> Option<AnnounceCaptures> {
        if let Some(captures) = PRIMARY_ANNOUNCE.captures(line) {
            trace!(target: "announce", "announce matched primary grammar");
            return Some(AnnounceCaptures::from_captures(
                &captures,
                AnnounceGrammar::Primary,
            ));
        }
        ALTERNATIVE_ANNOUNCE.captures(line).map(|captures| {
            trace!(target: "announce", "announce matched alternative grammar");
            AnnounceCaptures::from_captures(&captures, AnnounceGrammar::Alternative)
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("announce has no artist")]
    MissingArtist,
    #[error("no torrent id in download url {0}")]
    MissingTorrentId(String),
}

pub struct ReleaseBuilder;

impl ReleaseBuilder {
    /// Turn announce captures into a release.
    pub fn build(captures: &AnnounceCaptures) -> Result<Release, ReleaseError> {
        let artists = split_artists(captures.get(ARTIST));
        if artists.is_empty() {
            return Err(ReleaseError::MissingArtist);
        }

        let torrent_url = captures.get(DOWNLOAD_URL).to_string();
        let torrent_id = TORRENT_ID
            .captures(&torrent_url)
            .and_then(|c| c[1].parse::<u64>().ok())
            .map(TorrentId)
            .ok_or_else(|| ReleaseError::MissingTorrentId(torrent_url.clone()))?;
        let url = captures.get(GROUP_URL).to_string();
        let group_id = GROUP_ID
            .captures(&url)
            .and_then(|c| c[1].parse::<u64>().ok())
            .map(GroupId);

        let mut release = Release {
            artists,
            title: captures.get(TITLE).trim().to_string(),
            year: captures.get(YEAR).parse().ok(),
            release_type: captures.get(RELEASE_TYPE).to_string(),
            format: captures.get(FORMAT).to_string(),
            quality: captures.get(QUALITY).to_string(),
            has_log: captures.get(LOG) == "Log",
            log_score: captures.get(LOG_SCORE).parse().ok(),
            has_cue: captures.get(CUE) == "Cue",
            is_scene: captures.get(SCENE) == "Scene",
            source: captures.get(SOURCE).to_string(),
            tags: split_tags(captures.get(TAGS)),
            url,
            torrent_url,
            torrent_id,
            group_id,
            timestamp: Utc::now(),
            ..Release::default()
        };
        release.torrent_file = torrent_filename(&release);
        Ok(release)
    }

    /// Build a release for a torrent requested by ID, from tracker metadata alone.
    pub fn from_metadata(
        metadata: &TrackerMetadata,
        group_url: String,
        download_url: String,
    ) -> Release {
        let mut artists = metadata.main_artists();
        if artists.is_empty() {
            artists.push(VARIOUS_ARTISTS.to_string());
        }

        let mut release = Release {
            artists,
            title: metadata.title.clone(),
            year: metadata.year,
            release_type: metadata.release_type.clone(),
            format: metadata.format.clone(),
            quality: metadata.quality.clone(),
            has_log: metadata.has_log,
            has_cue: metadata.has_cue,
            is_scene: metadata.is_scene,
            source: metadata.source.clone(),
            tags: metadata.tags.clone(),
            url: group_url,
            torrent_url: download_url,
            torrent_id: metadata.id,
            timestamp: Utc::now(),
            ..Release::default()
        };
        release.apply_metadata(metadata);
        release.torrent_file = torrent_filename(&release);
        release
    }
}

/// Split a credit like `A & B performed by C`. The unsplit credit is kept as
/// the last entry when it contained several artists.
pub fn split_artists(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let mut artists: Vec<String> = ARTIST_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|artist| !artist.is_empty())
        .map(str::to_string)
        .collect();
    if artists.len() > 1 {
        artists.push(raw.to_string());
    }
    artists
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn torrent_filename(release: &Release) -> String {
    let year = release
        .year
        .map(|year| format!(" ({})", year))
        .unwrap_or_default();
    let name = format!(
        "{} - {}{} [{} {} {} {}] - {}.torrent",
        release.primary_artist(),
        release.title,
        year,
        release.release_type,
        release.format,
        release.quality.replace('/', "-"),
        release.source,
        release.torrent_id
    );
    sanitize_filename(&name)
}

/// Drop characters that are not allowed in file names on common filesystems.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_domain::{ArtistCredit, ArtistRole};

    const SIMPLE: &str = "An artist - Title [2013] [Album] - MP3 / 320 / CD - https://mysterious.address/torrents.php?id=93821 / https://mysterious.address/torrents.php?action=download&id=981243 - tag1.taggy,tag2.mctagface";

    fn parse(line: &str) -> Release {
        let captures = AnnounceParser::parse(line).expect("announce should match");
        ReleaseBuilder::build(&captures).expect("release should build")
    }

    #[test]
    fn parses_simple_announce() {
        let captures = AnnounceParser::parse(SIMPLE).unwrap();
        assert_eq!(captures.grammar(), AnnounceGrammar::Primary);
        assert_eq!(captures.fields().len(), ANNOUNCE_FIELDS);

        let release = ReleaseBuilder::build(&captures).unwrap();
        assert_eq!(release.artists, vec!["An artist"]);
        assert_eq!(release.title, "Title");
        assert_eq!(release.year, Some(2013));
        assert_eq!(release.release_type, "Album");
        assert_eq!(release.format, "MP3");
        assert_eq!(release.quality, "320");
        assert_eq!(release.source, "CD");
        assert!(!release.has_log);
        assert_eq!(release.log_score, None);
        assert!(!release.has_cue);
        assert!(!release.is_scene);
        assert_eq!(release.tags, vec!["tag1.taggy", "tag2.mctagface"]);
        assert_eq!(release.torrent_id, TorrentId(981243));
        assert_eq!(release.group_id, Some(GroupId(93821)));
        assert_eq!(
            release.torrent_file,
            "An artist - Title (2013) [Album MP3 320 CD] - 981243.torrent"
        );
    }

    #[test]
    fn parses_log_score_cue_and_scene() {
        let release = parse("Artist - Title [2001] [EP] - FLAC / Lossless / Log / 95% / Cue / CD / Scene - https://t.example/torrents.php?id=1 / https://t.example/torrents.php?action=download&id=2 - jazz, blues");

        assert!(release.has_log);
        assert_eq!(release.log_score, Some(95));
        assert!(release.has_cue);
        assert!(release.is_scene);
        assert_eq!(release.source, "CD");
        assert_eq!(release.tags, vec!["jazz", "blues"]);
    }

    #[test]
    fn title_and_artist_keep_special_characters() {
        let release = parse(r"An artist:!, with / another artist! :)ÆΩ¢ - Title / \ with - utf8 characters éç_?<Ω>§Ð¢<¢<Ð> [1999] [EP] - FLAC / 24bit Lossless / Vinyl / Scene - https://mysterious.address/torrents.php?id=93821 / https://mysterious.address/torrents.php?action=download&id=981243 - tag.mctagface");

        assert_eq!(release.artists, vec!["An artist:!, with / another artist! :)ÆΩ¢"]);
        assert_eq!(release.title, r"Title / \ with - utf8 characters éç_?<Ω>§Ð¢<¢<Ð>");
        assert_eq!(release.quality, "24bit Lossless");
        assert!(release.is_scene);
        assert_eq!(
            release.torrent_file,
            "An artist!, with another artist! )ÆΩ¢ - Title with - utf8 characters éç_Ω§Ð¢¢Ð (1999) [EP FLAC 24bit Lossless Vinyl] - 981243.torrent"
        );
    }

    #[test]
    fn first_separator_splits_artist_from_title() {
        let release = parse("A - B - X [1999] [Live album] - AAC / 256 / WEB - https://mysterious.address/torrents.php?id=93821 / https://mysterious.address/torrents.php?action=download&id=981243 - tag.mctagface");
        assert_eq!(release.artists, vec!["A"]);
        assert_eq!(release.title, "B - X");
        assert_eq!(release.release_type, "Live album");
    }

    #[test]
    fn splits_collaborations() {
        let release = parse("First dude & another one performed by yet another - Title [1992] [Soundtrack] - FLAC / Lossless / Cassette - https://mysterious.address/torrents.php?id=452658 / https://mysterious.address/torrents.php?action=download&id=922578 - classical");
        assert_eq!(
            release.artists,
            vec![
                "First dude",
                "another one",
                "yet another",
                "First dude & another one performed by yet another"
            ]
        );
        assert_eq!(release.primary_artist(), "First dude");
    }

    #[test]
    fn parses_alternative_grammar() {
        let line = "Artist - Title [2020] [Album] - FLAC / Lossless / Log / 100% / Cue / CD - rock, jazz - https://t.example/torrents.php?id=7 / https://t.example/torrents.php?action=download&id=8&authkey=abc&torrent_pass=def";
        let captures = AnnounceParser::parse(line).unwrap();
        assert_eq!(captures.grammar(), AnnounceGrammar::Alternative);

        let release = ReleaseBuilder::build(&captures).unwrap();
        assert_eq!(release.tags, vec!["rock", "jazz"]);
        assert_eq!(release.url, "https://t.example/torrents.php?id=7");
        assert_eq!(
            release.torrent_url,
            "https://t.example/torrents.php?action=download&id=8&authkey=abc&torrent_pass=def"
        );
        assert_eq!(release.torrent_id, TorrentId(8));
        assert_eq!(release.log_score, Some(100));
    }

    #[test]
    fn non_music_announce_does_not_match() {
        assert!(AnnounceParser::parse("Non-music artist - Ebook Title!  - https://mysterious.address/torrents.php?id=452618 / https://mysterious.address/torrents.php?action=download&id=922495 - science.fiction,medieval.history").is_none());
        assert!(AnnounceParser::parse("").is_none());
    }

    #[test]
    fn unknown_year_is_none() {
        let release = parse("Artist - Title [] [Album] - MP3 / V0 (VBR) / WEB - https://t.example/torrents.php?id=1 / https://t.example/torrents.php?action=download&id=2 - rock");
        assert_eq!(release.year, None);
        assert_eq!(release.quality, "V0 (VBR)");
        assert_eq!(release.torrent_file, "Artist - Title [Album MP3 V0 (VBR) WEB] - 2.torrent");
    }

    #[test]
    fn parsing_is_deterministic() {
        let mut first = parse(SIMPLE);
        let second = parse(SIMPLE);
        first.timestamp = second.timestamp;
        assert_eq!(first, second);
    }

    #[test]
    fn release_from_metadata_uses_main_artists() {
        let metadata = TrackerMetadata {
            id: TorrentId(50),
            group_id: GroupId(5),
            title: "Kind of Blue".to_string(),
            year: Some(1959),
            release_type: "Album".to_string(),
            artists: vec![ArtistCredit {
                id: 1,
                name: "Miles Davis".to_string(),
                role: ArtistRole::Main,
            }],
            format: "FLAC".to_string(),
            quality: "24bit Lossless".to_string(),
            source: "Vinyl".to_string(),
            size: 2048,
            uploader: Some("up".to_string()),
            ..TrackerMetadata::default()
        };

        let release = ReleaseBuilder::from_metadata(
            &metadata,
            "https://t/torrents.php?id=5".to_string(),
            "https://t/torrents.php?action=download&id=50".to_string(),
        );
        assert_eq!(release.artists, vec!["Miles Davis"]);
        assert_eq!(release.group_id, Some(GroupId(5)));
        assert_eq!(release.size, 2048);
        assert_eq!(
            release.torrent_file,
            "Miles Davis - Kind of Blue (1959) [Album FLAC 24bit Lossless Vinyl] - 50.torrent"
        );
    }

    #[test]
    fn sanitize_drops_illegal_characters() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j\u{7}"), "abcdefghij");
    }
}
