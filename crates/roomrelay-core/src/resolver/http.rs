//! Blocking GET over libcurl, collecting the response body.

use std::time::Duration;

use super::ResolveError;

pub(super) struct GetRequest {
    pub url: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

/// Performs the GET and returns the body of a 2xx response.
/// Runs in the current thread; call from `spawn_blocking` in async code.
pub(super) fn get(req: &GetRequest) -> Result<Vec<u8>, ResolveError> {
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&req.url).map_err(ResolveError::Transport)?;
    easy.get(true).map_err(ResolveError::Transport)?;
    easy.follow_location(true).map_err(ResolveError::Transport)?;
    easy.accept_encoding("").map_err(ResolveError::Transport)?;
    easy.connect_timeout(req.connect_timeout)
        .map_err(ResolveError::Transport)?;
    easy.timeout(req.timeout).map_err(ResolveError::Transport)?;
    if let Some(ua) = &req.user_agent {
        easy.useragent(ua).map_err(ResolveError::Transport)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(ResolveError::Transport)?;
        transfer.perform().map_err(ResolveError::Transport)?;
    }

    let code = easy.response_code().map_err(ResolveError::Transport)?;
    if !(200..300).contains(&code) {
        return Err(ResolveError::Http(code));
    }
    Ok(body)
}
