//! Browser-neutral view of page network traffic and the identifier pair it yields.
//!
//! The browser session translates its own protocol events into [`TrafficEvent`]s;
//! detection strategies only ever see these, which keeps them testable without
//! a browser.

mod parse;

pub use parse::{check_alive_room, query_param, CheckAliveEntry};

/// One network observation from the page under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrafficEvent {
    /// An outbound request was issued.
    Request { url: String },
    /// An inbound response. `request_url` is the URL of the request that produced
    /// it, captured together with the response so nothing has to be correlated later.
    /// `body` is only present when the session was asked to fetch it.
    Response {
        url: String,
        status: u16,
        body: Option<String>,
        request_url: String,
    },
}

impl TrafficEvent {
    pub fn url(&self) -> &str {
        match self {
            TrafficEvent::Request { url } | TrafficEvent::Response { url, .. } => url,
        }
    }
}

/// Room identifier plus the application id (`aid`) the lookup endpoint needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierPair {
    pub room_id: String,
    pub app_id: String,
}

impl IdentifierPair {
    pub fn new(room_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            app_id: app_id.into(),
        }
    }

    /// Both halves present; a partial pair is never handed to the resolver.
    pub fn is_complete(&self) -> bool {
        !self.room_id.is_empty() && !self.app_id.is_empty()
    }

    /// Overwrite the room id if `value` is non-empty.
    pub fn set_room_id(&mut self, value: Option<String>) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.room_id = v;
        }
    }

    /// Overwrite the app id if `value` is non-empty.
    pub fn set_app_id(&mut self, value: Option<String>) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.app_id = v;
        }
    }
}
