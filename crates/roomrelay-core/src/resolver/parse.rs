//! Room info body parsing: `{ data: { stream_url: { hls_pull_url } } }`.

use serde::Deserialize;

use super::{PlaybackDescriptor, ResolveError, Resolution};

#[derive(Debug, Deserialize)]
struct RoomInfo {
    #[serde(default)]
    data: Option<RoomData>,
}

#[derive(Debug, Deserialize)]
struct RoomData {
    stream_url: StreamUrl,
}

#[derive(Debug, Deserialize)]
struct StreamUrl {
    #[serde(default)]
    hls_pull_url: String,
}

/// Parse a room info body. Missing or null `data` is `NotFound`; `data`
/// without `stream_url` is malformed. An empty pull URL counts as not found.
pub fn parse_room_info(body: &[u8], strip: bool) -> Result<Resolution, ResolveError> {
    let info: RoomInfo = serde_json::from_slice(body).map_err(ResolveError::Malformed)?;
    let Some(data) = info.data else {
        return Ok(Resolution::NotFound);
    };
    let url = data.stream_url.hls_pull_url;
    if url.is_empty() {
        return Ok(Resolution::NotFound);
    }
    let url = if strip {
        strip_query(&url).to_string()
    } else {
        url
    };
    Ok(Resolution::Found(PlaybackDescriptor { url }))
}

/// Everything before the first `?`.
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(head, _)| head)
}
