//! Query-string and liveness-body parsing for observed traffic.

use serde::Deserialize;

use crate::detector::ObservationError;

/// Body of the liveness check endpoint: `{ "data": [ { "alive": true, "room_id_str": "..." } ] }`.
#[derive(Debug, Deserialize)]
struct CheckAliveBody {
    #[serde(default)]
    data: Vec<CheckAliveEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CheckAliveEntry {
    #[serde(default)]
    pub alive: bool,
    #[serde(default)]
    pub room_id_str: Option<String>,
}

/// Value of query parameter `name` in `url`, if present.
pub fn query_param(url: &str, name: &str) -> Result<Option<String>, ObservationError> {
    let parsed = url::Url::parse(url).map_err(|source| ObservationError::Url {
        url: url.to_string(),
        source,
    })?;
    Ok(parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned()))
}

/// Room id reported live by a liveness body, judged on its first entry only.
pub fn check_alive_room(body: &str) -> Result<Option<String>, ObservationError> {
    let parsed: CheckAliveBody = serde_json::from_str(body).map_err(ObservationError::Json)?;
    let Some(first) = parsed.data.into_iter().next() else {
        return Ok(None);
    };
    if !first.alive {
        return Ok(None);
    }
    Ok(first.room_id_str.filter(|s| !s.is_empty()))
}
