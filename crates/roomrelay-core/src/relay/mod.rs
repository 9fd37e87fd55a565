//! Relay launcher: start the transcoder that pulls the playback URL and pushes
//! it to the ingest destination.
//!
//! Launch returns right after the child starts; the child is then supervised by
//! a task behind [`RelayHandle`], which the caller may await, cancel, or drop
//! (the child keeps running detached).

mod args;
mod handle;

pub use args::transcoder_args;
pub use handle::{RelayCanceller, RelayExit, RelayHandle};

use std::process::Stdio;

use crate::config::TranscoderSettings;
use crate::resolver::PlaybackDescriptor;

/// Operator-supplied ingest destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTarget {
    pub base_url: String,
    pub stream_key: String,
}

impl RelayTarget {
    pub fn new(base_url: impl Into<String>, stream_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            stream_key: stream_key.into(),
        }
    }

    /// Base URL and stream key concatenated verbatim.
    pub fn destination(&self) -> String {
        format!("{}{}", self.base_url, self.stream_key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to start transcoder {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("waiting on transcoder: {0}")]
    Wait(#[source] std::io::Error),
    #[error("transcoder supervisor task failed: {0}")]
    Join(String),
}

/// Starts relays. The pipeline only depends on this trait.
pub trait Launcher: Send + Sync {
    fn launch(
        &self,
        playback: &PlaybackDescriptor,
        destination: &str,
    ) -> Result<RelayHandle, RelayError>;
}

/// Launches the configured transcoder binary (ffmpeg by default).
#[derive(Debug, Clone)]
pub struct TranscoderLauncher {
    settings: TranscoderSettings,
    detached: bool,
}

impl TranscoderLauncher {
    pub fn new(settings: TranscoderSettings) -> Self {
        Self {
            settings,
            detached: false,
        }
    }

    /// Send the transcoder's output to /dev/null instead of capturing it, so it
    /// keeps running after this process (and its pipes) are gone.
    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    fn output(&self) -> Stdio {
        if self.detached {
            Stdio::null()
        } else {
            Stdio::piped()
        }
    }
}

impl Launcher for TranscoderLauncher {
    /// Must be called from within a tokio runtime.
    fn launch(
        &self,
        playback: &PlaybackDescriptor,
        destination: &str,
    ) -> Result<RelayHandle, RelayError> {
        let args = transcoder_args(&self.settings, playback.as_str(), destination);
        tracing::info!(
            "forwarding stream {} to relay server at: {}",
            playback.url,
            destination
        );
        tracing::debug!(program = %self.settings.program, ?args, "starting transcoder");

        let child = tokio::process::Command::new(&self.settings.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(self.output())
            .stderr(self.output())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| RelayError::Spawn {
                program: self.settings.program.clone(),
                source,
            })?;

        Ok(RelayHandle::supervise(
            child,
            destination.to_string(),
            self.settings.capture_limit_bytes,
        ))
    }
}
