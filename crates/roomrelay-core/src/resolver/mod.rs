//! Resolver: turn a detected identifier pair into a playable stream URL.
//!
//! The pipeline only depends on the [`Lookup`] trait; [`RoomInfoLookup`] is the
//! libcurl-backed implementation against the room info endpoint.

mod http;
mod parse;

pub use parse::{parse_room_info, strip_query};

use async_trait::async_trait;
use std::time::Duration;

use crate::config::LookupSettings;
use crate::traffic::IdentifierPair;

/// Playback URL ready for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackDescriptor {
    pub url: String,
}

impl PlaybackDescriptor {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(PlaybackDescriptor),
    /// The lookup answered but carried no `data`: nothing to relay.
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("identifier pair is incomplete (room_id={room_id:?}, aid={app_id:?})")]
    IncompletePair { room_id: String, app_id: String },
    #[error("invalid lookup endpoint {0}")]
    Endpoint(String),
    #[error("room info request failed: {0}")]
    Transport(#[source] curl::Error),
    #[error("room info request returned HTTP {0}")]
    Http(u32),
    #[error("room info response is malformed: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("room info worker failed: {0}")]
    Join(String),
}

/// Anything that can resolve an identifier pair to a playback URL.
#[async_trait]
pub trait Lookup: Send + Sync {
    async fn resolve(&self, pair: &IdentifierPair) -> Result<Resolution, ResolveError>;
}

/// Room info lookup over HTTP GET.
#[derive(Debug, Clone)]
pub struct RoomInfoLookup {
    endpoint: String,
    connect_timeout: Duration,
    timeout: Duration,
    user_agent: Option<String>,
    strip_query: bool,
}

impl RoomInfoLookup {
    pub fn new(settings: &LookupSettings, strip_query: bool) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            timeout: Duration::from_secs(settings.timeout_secs),
            user_agent: settings.user_agent.clone(),
            strip_query,
        }
    }

    /// Lookup URL for `pair`: the endpoint with `aid` and `room_id` appended.
    pub fn room_info_url(&self, pair: &IdentifierPair) -> Result<String, ResolveError> {
        let mut url = url::Url::parse(&self.endpoint)
            .map_err(|e| ResolveError::Endpoint(format!("{}: {}", self.endpoint, e)))?;
        url.query_pairs_mut()
            .append_pair("aid", &pair.app_id)
            .append_pair("room_id", &pair.room_id);
        Ok(url.into())
    }
}

#[async_trait]
impl Lookup for RoomInfoLookup {
    async fn resolve(&self, pair: &IdentifierPair) -> Result<Resolution, ResolveError> {
        if !pair.is_complete() {
            return Err(ResolveError::IncompletePair {
                room_id: pair.room_id.clone(),
                app_id: pair.app_id.clone(),
            });
        }
        let url = self.room_info_url(pair)?;
        tracing::info!(room_id = %pair.room_id, "fetching playback URL from {}", url);

        let request = http::GetRequest {
            url,
            connect_timeout: self.connect_timeout,
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
        };
        // curl is blocking; keep it off the event loop.
        let body = tokio::task::spawn_blocking(move || http::get(&request))
            .await
            .map_err(|e| ResolveError::Join(e.to_string()))??;

        let resolution = parse_room_info(&body, self.strip_query)?;
        match &resolution {
            Resolution::Found(playback) => {
                tracing::info!("playback URL detected: {}", playback.url)
            }
            Resolution::NotFound => tracing::info!("no playback URL found in room info"),
        }
        Ok(resolution)
    }
}
