//! Detection strategies: which traffic carries the room id and `aid`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::DetectorSettings;
use crate::traffic::{check_alive_room, query_param, IdentifierPair, TrafficEvent};

use super::ObservationError;

/// Pulls identifier fields out of traffic events into a pair.
pub trait DetectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// URL substring whose responses need their body fetched, if any.
    fn body_marker(&self) -> Option<&str>;

    /// Inspect one event, filling whatever fields it carries.
    fn observe(&self, event: &TrafficEvent, pair: &mut IdentifierPair)
        -> Result<(), ObservationError>;
}

/// Reads `current_room_id` and `aid` from the query of user-info requests.
#[derive(Debug, Clone)]
pub struct RequestInspection {
    marker: String,
}

impl RequestInspection {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl DetectionStrategy for RequestInspection {
    fn name(&self) -> &'static str {
        "request"
    }

    fn body_marker(&self) -> Option<&str> {
        None
    }

    fn observe(
        &self,
        event: &TrafficEvent,
        pair: &mut IdentifierPair,
    ) -> Result<(), ObservationError> {
        let TrafficEvent::Request { url } = event else {
            return Ok(());
        };
        if !url.contains(&self.marker) {
            return Ok(());
        }
        let room_id = query_param(url, "current_room_id")?;
        let aid = query_param(url, "aid")?;
        tracing::debug!(url = %url, ?room_id, ?aid, "user-info request observed");
        pair.set_room_id(room_id);
        pair.set_app_id(aid);
        Ok(())
    }
}

/// Reads the room id from liveness-check response bodies, and `aid` from the
/// request URL captured with that same response.
#[derive(Debug, Clone)]
pub struct ResponseInspection {
    marker: String,
}

impl ResponseInspection {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl DetectionStrategy for ResponseInspection {
    fn name(&self) -> &'static str {
        "response"
    }

    fn body_marker(&self) -> Option<&str> {
        Some(&self.marker)
    }

    fn observe(
        &self,
        event: &TrafficEvent,
        pair: &mut IdentifierPair,
    ) -> Result<(), ObservationError> {
        let TrafficEvent::Response {
            url,
            body,
            request_url,
            ..
        } = event
        else {
            return Ok(());
        };
        if !url.contains(&self.marker) {
            return Ok(());
        }
        let body = body
            .as_deref()
            .ok_or_else(|| ObservationError::MissingBody(url.clone()))?;
        match check_alive_room(body)? {
            Some(room_id) => pair.set_room_id(Some(room_id)),
            None => tracing::debug!(url = %url, "liveness check reports room not alive"),
        }
        pair.set_app_id(query_param(request_url, "aid")?);
        Ok(())
    }
}

/// Detection variant selected in config or on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Inspect outbound user-info request URLs.
    #[default]
    Request,
    /// Inspect liveness-check response bodies.
    Response,
}

impl Variant {
    /// Response inspection historically returned a query-free playback URL.
    pub fn strips_query_by_default(self) -> bool {
        matches!(self, Variant::Response)
    }

    pub fn strategy(self, settings: &DetectorSettings) -> Box<dyn DetectionStrategy> {
        match self {
            Variant::Request => Box::new(RequestInspection::new(&settings.user_info_marker)),
            Variant::Response => Box::new(ResponseInspection::new(&settings.check_alive_marker)),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Request => f.write_str("request"),
            Variant::Response => f.write_str("response"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown detection variant {0:?} (expected \"request\" or \"response\")")]
pub struct UnknownVariant(String);

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" | "a" => Ok(Variant::Request),
            "response" | "b" => Ok(Variant::Response),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}
