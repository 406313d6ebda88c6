// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{GazelleError, Result};
use crate::models::{GazelleEnvelope, TorrentResponse};
use crate::rate_limiter::RateLimiter;
use apiary_domain::{GroupId, TorrentId, TrackerMetadata};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};
use url::Url;

const USER_AGENT: &str = concat!("apiary/", env!("CARGO_PKG_VERSION"));

/// Login state of a tracker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggingIn,
    LoggedIn,
}

/// Client for a Gazelle tracker's JSON API, sharing one rate limiter between all callers.
#[derive(Debug, Clone)]
pub struct GazelleClient {
    name: String,
    client: Client,
    base_url: String,
    user: String,
    password: String,
    rate_limiter: RateLimiter,
    session: Arc<RwLock<SessionState>>,
    login_lock: Arc<Mutex<()>>,
    tmp_dir: PathBuf,
}

impl GazelleClient {
    /// Create a client builder for the tracker at `base_url`.
    pub fn builder(name: impl Into<String>, base_url: impl Into<String>) -> GazelleClientBuilder {
        GazelleClientBuilder::new(name, base_url)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub async fn session_state(&self) -> SessionState {
        *self.session.read().await
    }

    /// Open a session with the configured credentials.
    ///
    /// The tracker redirects away from the login page on success; landing back
    /// on it means the credentials were refused.
    pub async fn login(&self) -> Result<()> {
        let _guard = self.login_lock.lock().await;
        *self.session.write().await = SessionState::LoggingIn;

        let result = self.post_login().await;
        let mut session = self.session.write().await;
        match result {
            Ok(()) => {
                *session = SessionState::LoggedIn;
                info!(target: "gazelle", tracker = %self.name, "logged in");
                Ok(())
            }
            Err(err) => {
                *session = SessionState::LoggedOut;
                warn!(target: "gazelle", tracker = %self.name, error = %err, "login failed");
                Err(err)
            }
        }
    }

    async fn post_login(&self) -> Result<()> {
        self.rate_limiter.acquire().await?;
        let url = format!("{}/login.php", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("username", self.user.as_str()),
                ("password", self.password.as_str()),
                ("keeplogged", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GazelleError::LoginFailed(format!(
                "login returned status {}",
                status
            )));
        }
        if response.url().path().ends_with("login.php") {
            return Err(GazelleError::LoginFailed("login page returned".to_string()));
        }
        Ok(())
    }

    /// Calls made without an open session fail right away.
    async fn ensure_logged_in(&self) -> Result<()> {
        let state = *self.session.read().await;
        match state {
            SessionState::LoggedIn => Ok(()),
            SessionState::LoggedOut => Err(GazelleError::NotLoggedIn),
            SessionState::LoggingIn => {
                let _guard = self.login_lock.lock().await;
                if *self.session.read().await == SessionState::LoggedIn {
                    Ok(())
                } else {
                    Err(GazelleError::NotLoggedIn)
                }
            }
        }
    }

    /// Fetch authoritative metadata for a torrent.
    ///
    /// A torrent the tracker does not know about yields [`GazelleError::NotFound`],
    /// with the reason of its removal when the site log mentions it.
    pub async fn fetch_metadata(&self, id: TorrentId) -> Result<TrackerMetadata> {
        let mut url = self.endpoint("ajax.php")?;
        url.query_pairs_mut()
            .append_pair("action", "torrent")
            .append_pair("id", &id.to_string());

        match self.get_json::<TorrentResponse>(url.as_str()).await {
            Ok(response) => Ok(response.into_metadata()),
            Err(err) if err.is_not_found() => {
                let reason = match self.deletion_reason(id).await {
                    Ok(reason) => reason,
                    Err(lookup_err) => {
                        debug!(target: "gazelle", torrent_id = %id, error = %lookup_err, "could not look up deletion reason");
                        None
                    }
                };
                Err(GazelleError::NotFound {
                    id: id.to_string(),
                    reason,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Search the site log for the line explaining why a torrent is gone.
    pub async fn deletion_reason(&self, id: TorrentId) -> Result<Option<String>> {
        lazy_static! {
            static ref TAG_REGEX: Regex = Regex::new(r"<[^>]*>").expect("valid tag regex");
        }

        let mut url = self.endpoint("log.php")?;
        url.query_pairs_mut()
            .append_pair("search", &format!("Torrent {}", id));

        self.ensure_logged_in().await?;
        let body = self.get_text(url.as_str()).await?;

        let needle = format!("Torrent {}", id);
        let reason = body
            .lines()
            .map(|line| TAG_REGEX.replace_all(line, "").trim().to_string())
            .find(|line| mentions(line, &needle))
            .map(|line| crate::models::unescape_html(&line));
        Ok(reason)
    }

    /// Download a .torrent file into `destination`, going through a partial file first.
    pub async fn download(&self, url: &str, destination: &Path, filename: &str) -> Result<PathBuf> {
        self.ensure_logged_in().await?;
        match self.fetch_torrent(url, destination, filename).await {
            Ok(path) => Ok(path),
            Err(err @ (GazelleError::Io(_) | GazelleError::RateLimiterClosed)) => Err(err),
            Err(err) => {
                warn!(target: "gazelle", tracker = %self.name, error = %err, "download failed, logging in again");
                self.login().await?;
                self.fetch_torrent(url, destination, filename).await
            }
        }
    }

    pub fn download_url(&self, id: TorrentId) -> String {
        format!("{}/torrents.php?action=download&id={}", self.base_url, id)
    }

    pub fn group_url(&self, id: GroupId) -> String {
        format!("{}/torrents.php?id={}", self.base_url, id)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| GazelleError::InvalidResponse(e.to_string()))
    }

    /// Rate-limited GET with the tracker's retry policy: a rate-limit answer is
    /// retried once, an unknown torrent is not retried, and anything else gets
    /// one new login and one more try.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.ensure_logged_in().await?;

        match self.call_json(url).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_rate_limited() => {
                warn!(target: "gazelle", tracker = %self.name, "rate limited by tracker, retrying once");
                self.call_json(url).await
            }
            Err(err) if err.is_not_found() => Err(err),
            Err(GazelleError::RateLimiterClosed) => Err(GazelleError::RateLimiterClosed),
            Err(err) => {
                warn!(target: "gazelle", tracker = %self.name, error = %err, "API call failed, logging in again");
                self.login().await?;
                self.call_json(url).await
            }
        }
    }

    async fn call_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        let envelope: GazelleEnvelope = serde_json::from_str(&body).map_err(|e| {
            GazelleError::InvalidResponse(format!("failed to parse response: {}", e))
        })?;
        envelope.into_result()
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.rate_limiter.acquire().await?;

        trace!(target: "gazelle", "GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        debug!(target: "gazelle", "response status: {}", status);

        if status.as_u16() == 429 {
            return Err(GazelleError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(GazelleError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        trace!(target: "gazelle", "response body: {}", body);
        Ok(body)
    }

    async fn fetch_torrent(
        &self,
        url: &str,
        destination: &Path,
        filename: &str,
    ) -> Result<PathBuf> {
        self.rate_limiter.acquire().await?;

        trace!(target: "gazelle", "GET {}", url);
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GazelleError::Http {
                status: status.as_u16(),
            });
        }

        let partial = self.tmp_dir.join(format!("{}.part", filename));
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await? {
            // bencoded torrents are dictionaries; anything else is an HTML error page
            if written == 0 && !chunk.is_empty() && chunk[0] != b'd' {
                drop(file);
                tokio::fs::remove_file(&partial).await?;
                return Err(GazelleError::Download(
                    "response is not a torrent file".to_string(),
                ));
            }
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;
        drop(file);

        if written == 0 {
            tokio::fs::remove_file(&partial).await?;
            return Err(GazelleError::Download("empty response".to_string()));
        }

        let target = destination.join(filename);
        move_file(&partial, &target).await?;
        info!(target: "gazelle", tracker = %self.name, path = %target.display(), bytes = written, "downloaded torrent");
        Ok(target)
    }
}

/// Whether `line` mentions exactly `needle`, not a longer ID starting with the same digits.
fn mentions(line: &str, needle: &str) -> bool {
    line.match_indices(needle).any(|(start, _)| {
        !line[start + needle.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_err() {
        // crossing filesystems
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}

/// Builder for configuring a Gazelle client.
#[derive(Debug)]
pub struct GazelleClientBuilder {
    name: String,
    base_url: String,
    user: String,
    password: String,
    timeout: Duration,
    api_calls: usize,
    api_period: Duration,
    tmp_dir: Option<PathBuf>,
}

impl GazelleClientBuilder {
    fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(30),
            api_calls: 2,
            api_period: Duration::from_secs(4),
            tmp_dir: None,
        }
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Set request timeout duration.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Allow `calls` API calls per `period`.
    pub fn rate_limit(mut self, calls: usize, period: Duration) -> Self {
        self.api_calls = calls;
        self.api_period = period;
        self
    }

    /// Directory for partial downloads.
    pub fn tmp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(dir.into());
        self
    }

    /// Build the client. Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<GazelleClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;

        Ok(GazelleClient {
            name: self.name,
            client,
            base_url: self.base_url,
            user: self.user,
            password: self.password,
            rate_limiter: RateLimiter::new(self.api_calls, self.api_period),
            session: Arc::new(RwLock::new(SessionState::LoggedOut)),
            login_lock: Arc::new(Mutex::new(())),
            tmp_dir: self.tmp_dir.unwrap_or_else(std::env::temp_dir),
        })
    }
}
