// SPDX-License-Identifier: GPL-3.0-or-later
use std::io::Write;

use apiary_config::{load, ConfigError};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn loads_trackers_autosnatch_and_filters() {
    let watch = tempfile::tempdir().expect("create watch dir");
    let file = write_config(&format!(
        r##"
[telemetry]
log_level = "debug"

[downloads]
watch_dir = "{watch}"

[[trackers]]
name = "blue"
url = "https://blue.example"
user = "me"
password = "secret"

[[autosnatch]]
tracker = "blue"
irc_server = "irc.blue.example:6667"
irc_key = "key"
nickserv_password = "pw"
bot_name = "me_bot"
announcer = "Drone"
announce_channel = "#blue-announce"
blacklisted_uploaders = ["spammer"]

[[filters]]
name = "perfect"
perfect_flac = true
included_tags = ["jazz"]
tracker = ["blue"]

[[filters]]
name = "web mp3"
format = ["MP3"]
source = ["WEB"]
type = ["Album", "EP"]
max_size_mb = 500
"##,
        watch = watch.path().display()
    ));

    let config = load(Some(file.path())).expect("load config");

    assert_eq!(config.telemetry.log_level, "debug");
    assert_eq!(config.trackers.len(), 1);
    let tracker = config.tracker("blue").expect("tracker configured");
    assert_eq!(tracker.api_calls, 2);
    assert_eq!(tracker.api_period_secs, 4);

    let autosnatch = config.autosnatch_for("blue").expect("autosnatch configured");
    assert!(autosnatch.enabled);
    assert_eq!(autosnatch.blacklisted_uploaders, vec!["spammer".to_string()]);

    assert_eq!(config.filters.len(), 2);
    let perfect = &config.filters[0];
    assert_eq!(perfect.format, vec!["FLAC".to_string()]);
    assert_eq!(perfect.log_score, Some(100));
    let web = &config.filters[1];
    assert_eq!(web.release_type, vec!["Album".to_string(), "EP".to_string()]);
    assert_eq!(web.max_size_mb, Some(500));

    assert_eq!(config.filters_for("blue").len(), 2);
    assert_eq!(config.filters_for("red").len(), 1);
}

#[test]
fn invalid_filter_is_fatal() {
    let watch = tempfile::tempdir().expect("create watch dir");
    let file = write_config(&format!(
        r#"
[downloads]
watch_dir = "{watch}"

[[filters]]
name = "greedy"
"#,
        watch = watch.path().display()
    ));

    let err = load(Some(file.path())).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::Filter { .. })
    ));
}

#[test]
fn defaults_without_file() {
    let config = load(None).expect("defaults are valid");
    assert_eq!(config.database.url, "sqlite://apiary.db");
    assert!(config.filters.is_empty());
}
