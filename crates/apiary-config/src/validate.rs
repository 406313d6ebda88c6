// SPDX-License-Identifier: GPL-3.0-or-later
use std::collections::HashSet;

use apiary_domain::{
    Filter, FORMAT_FLAC, KNOWN_FORMATS, KNOWN_QUALITIES, KNOWN_RELEASE_TYPES, KNOWN_SOURCES,
    QUALITY_24BIT_LOSSLESS, QUALITY_LOSSLESS, SOURCE_CD,
};
use thiserror::Error;
use tracing::debug;

use crate::{AppConfig, AutosnatchConfig, TrackerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid tracker {name:?}: {reason}")]
    Tracker { name: String, reason: String },

    #[error("invalid autosnatch section for {tracker:?}: {reason}")]
    Autosnatch { tracker: String, reason: String },

    #[error("invalid filter {name:?}: {reason}")]
    Filter { name: String, reason: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

fn filter_error(filter: &Filter, reason: impl Into<String>) -> ConfigError {
    ConfigError::Filter {
        name: filter.name.clone(),
        reason: reason.into(),
    }
}

/// Validate the whole configuration, expanding `perfect_flac` filters in place.
pub fn validate(config: &mut AppConfig) -> Result<(), ConfigError> {
    validate_trackers(&config.trackers)?;
    validate_autosnatch(&config.autosnatch, &config.trackers)?;

    let tracker_names: Vec<&str> = config.trackers.iter().map(|t| t.name.as_str()).collect();
    let mut names = HashSet::new();
    for filter in config.filters.iter_mut() {
        validate_filter(filter, &tracker_names)?;
        if !names.insert(filter.name.clone()) {
            return Err(filter_error(filter, "filter names must be unique"));
        }
    }

    if !config.filters.is_empty() || !config.autosnatch.is_empty() {
        match &config.downloads.watch_dir {
            None => {
                return Err(ConfigError::Validation(
                    "downloads.watch_dir is required to snatch anything".to_string(),
                ))
            }
            Some(dir) if !dir.is_dir() => {
                return Err(ConfigError::Validation(format!(
                    "downloads.watch_dir {} does not exist",
                    dir.display()
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn validate_trackers(trackers: &[TrackerConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for tracker in trackers {
        let err = |reason: &str| ConfigError::Tracker {
            name: tracker.name.clone(),
            reason: reason.to_string(),
        };
        if tracker.name.trim().is_empty() {
            return Err(err("missing name"));
        }
        if !names.insert(tracker.name.as_str()) {
            return Err(err("tracker names must be unique"));
        }
        if tracker.url.trim().is_empty() {
            return Err(err("missing url"));
        }
        if tracker.user.is_empty() || tracker.password.is_empty() {
            return Err(err("missing user or password"));
        }
        if tracker.api_calls == 0 || tracker.api_period_secs == 0 {
            return Err(err("api_calls and api_period_secs must be positive"));
        }
    }
    Ok(())
}

fn validate_autosnatch(
    sections: &[AutosnatchConfig],
    trackers: &[TrackerConfig],
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for section in sections {
        let err = |reason: &str| ConfigError::Autosnatch {
            tracker: section.tracker.clone(),
            reason: reason.to_string(),
        };
        if !trackers.iter().any(|t| t.name == section.tracker) {
            return Err(err("tracker is not configured"));
        }
        if !seen.insert(section.tracker.as_str()) {
            return Err(err("only one autosnatch section per tracker"));
        }
        if !is_host_port(&section.irc_server) {
            return Err(err("irc_server must be in the form host:port"));
        }
        if section.irc_key.is_empty() {
            return Err(err("missing irc_key"));
        }
        if section.nickserv_password.is_empty() {
            return Err(err("missing nickserv_password"));
        }
        if section.bot_name.is_empty() {
            return Err(err("missing bot_name"));
        }
        if section.announcer.is_empty() {
            return Err(err("missing announcer"));
        }
        if !section.announce_channel.starts_with('#') {
            return Err(err("announce_channel must start with #"));
        }
    }
    Ok(())
}

fn is_host_port(value: &str) -> bool {
    match value.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

fn overlaps(a: &[String], b: &[String]) -> Option<String> {
    a.iter().find(|value| b.contains(value)).cloned()
}

fn unknown_value<'a>(values: &'a [String], known: &[&str]) -> Option<&'a String> {
    values.iter().find(|value| !known.contains(&value.as_str()))
}

fn perfect_flac_qualities() -> Vec<String> {
    vec![QUALITY_LOSSLESS.to_string(), QUALITY_24BIT_LOSSLESS.to_string()]
}

/// Replace the `perfect_flac` shorthand by the criteria it stands for.
/// Applying it to an already expanded filter changes nothing.
pub fn expand_perfect_flac(filter: &mut Filter) {
    if !filter.perfect_flac {
        return;
    }
    filter.format = vec![FORMAT_FLAC.to_string()];
    filter.quality = perfect_flac_qualities();
    filter.source = KNOWN_SOURCES.iter().map(|s| s.to_string()).collect();
    filter.has_log = true;
    filter.has_cue = true;
    filter.log_score = Some(100);
}

fn validate_filter(filter: &mut Filter, trackers: &[&str]) -> Result<(), ConfigError> {
    if filter.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "every filter needs a name".to_string(),
        ));
    }

    let wants_cd_details =
        filter.has_log || filter.has_cue || filter.log_score_threshold().is_some();
    if wants_cd_details
        && !filter.source.is_empty()
        && !filter.source.iter().any(|s| s == SOURCE_CD)
    {
        return Err(filter_error(
            filter,
            "has_log, has_cue and log_score only apply when CD is an accepted source",
        ));
    }

    if filter.min_size_mb.is_some_and(|min| min < 0)
        || filter.max_size_mb.is_some_and(|max| max < 0)
    {
        return Err(filter_error(filter, "sizes must be positive"));
    }
    if let (Some(min), Some(max)) = (filter.min_size_mb, filter.max_size_mb) {
        if max > 0 && min >= max {
            return Err(filter_error(filter, "min_size_mb must be below max_size_mb"));
        }
    }

    if let Some(dir) = &filter.watch_dir {
        if !dir.is_dir() {
            return Err(filter_error(
                filter,
                format!("watch_dir {} does not exist", dir.display()),
            ));
        }
    }

    if let Some(artist) = overlaps(&filter.artist, &filter.excluded_artist) {
        return Err(filter_error(
            filter,
            format!("artist {artist:?} is both included and excluded"),
        ));
    }
    if let Some(tag) = overlaps(&filter.included_tags, &filter.excluded_tags) {
        return Err(filter_error(
            filter,
            format!("tag {tag:?} is both included and excluded"),
        ));
    }
    if let Some(kind) = overlaps(&filter.release_type, &filter.excluded_release_type) {
        return Err(filter_error(
            filter,
            format!("release type {kind:?} is both included and excluded"),
        ));
    }

    if filter.unique_in_group && filter.allow_duplicates {
        return Err(filter_error(
            filter,
            "unique_in_group and allow_duplicates are mutually exclusive",
        ));
    }

    if filter.perfect_flac {
        if !filter.format.is_empty()
            || !filter.quality.is_empty()
            || !filter.source.is_empty()
            || filter.has_log
            || filter.has_cue
            || filter.log_score_threshold().is_some()
        {
            return Err(filter_error(
                filter,
                "perfect_flac cannot be combined with format, quality, source, has_log, has_cue or log_score",
            ));
        }
        expand_perfect_flac(filter);
        debug!(target: "config", filter = %filter.name, "expanded perfect_flac");
    }

    if !filter.has_criteria() {
        return Err(filter_error(filter, "empty filter would snatch everything"));
    }

    if !filter.year.is_empty() && !filter.edition_year.is_empty() {
        return Err(filter_error(
            filter,
            "year and edition_year are mutually exclusive",
        ));
    }

    if let Some(value) = unknown_value(&filter.format, KNOWN_FORMATS) {
        return Err(filter_error(filter, format!("unknown format {value:?}")));
    }
    if let Some(value) = unknown_value(&filter.source, KNOWN_SOURCES) {
        return Err(filter_error(filter, format!("unknown source {value:?}")));
    }
    if let Some(value) = unknown_value(&filter.quality, KNOWN_QUALITIES) {
        return Err(filter_error(filter, format!("unknown quality {value:?}")));
    }
    if let Some(value) = unknown_value(&filter.release_type, KNOWN_RELEASE_TYPES)
        .or_else(|| unknown_value(&filter.excluded_release_type, KNOWN_RELEASE_TYPES))
    {
        return Err(filter_error(filter, format!("unknown release type {value:?}")));
    }

    if let Some(tracker) = filter
        .tracker
        .iter()
        .find(|t| !trackers.contains(&t.as_str()))
    {
        return Err(filter_error(
            filter,
            format!("unknown tracker {tracker:?}"),
        ));
    }

    Ok(())
}
