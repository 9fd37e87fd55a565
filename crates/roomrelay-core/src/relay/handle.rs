//! Supervised transcoder child: exit status, captured output, cancellation.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::RelayError;

/// How the transcoder ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayExit {
    pub success: bool,
    /// None when killed by a signal.
    pub code: Option<i32>,
    /// Tail of stdout (bounded by `capture_limit_bytes`).
    pub stdout: String,
    /// Tail of stderr (bounded by `capture_limit_bytes`).
    pub stderr: String,
    /// True if the relay was stopped through its canceller.
    pub cancelled: bool,
}

/// Clonable stop signal for a running relay.
#[derive(Debug, Clone, Default)]
pub struct RelayCanceller(Arc<Notify>);

impl RelayCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the supervisor to kill the transcoder. Safe to call before the
    /// supervisor starts waiting, and more than once.
    pub fn cancel(&self) {
        self.0.notify_one();
    }

    async fn cancelled(&self) {
        self.0.notified().await
    }
}

/// Handle on a launched relay. Dropping it detaches: the child keeps running.
#[derive(Debug)]
pub struct RelayHandle {
    destination: String,
    canceller: RelayCanceller,
    task: JoinHandle<Result<RelayExit, RelayError>>,
}

impl RelayHandle {
    /// Wrap an already running supervisor task. Used by launchers other than
    /// the built-in transcoder one.
    pub fn new(
        destination: String,
        canceller: RelayCanceller,
        task: JoinHandle<Result<RelayExit, RelayError>>,
    ) -> Self {
        Self {
            destination,
            canceller,
            task,
        }
    }

    pub(super) fn supervise(child: Child, destination: String, capture_limit: usize) -> Self {
        let canceller = RelayCanceller::new();
        let task = tokio::spawn(supervise(
            child,
            destination.clone(),
            canceller.clone(),
            capture_limit,
        ));
        Self::new(destination, canceller, task)
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn canceller(&self) -> RelayCanceller {
        self.canceller.clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the transcoder to exit.
    pub async fn wait(self) -> Result<RelayExit, RelayError> {
        self.task
            .await
            .map_err(|e| RelayError::Join(e.to_string()))?
    }
}

async fn supervise(
    mut child: Child,
    destination: String,
    canceller: RelayCanceller,
    capture_limit: usize,
) -> Result<RelayExit, RelayError> {
    let stdout = tokio::spawn(capture_tail(child.stdout.take(), capture_limit));
    let stderr = tokio::spawn(capture_tail(child.stderr.take(), capture_limit));

    let (status, cancelled) = tokio::select! {
        status = child.wait() => (status.map_err(RelayError::Wait)?, false),
        _ = canceller.cancelled() => {
            tracing::info!("stopping transcoder for {}", destination);
            if let Err(err) = child.kill().await {
                tracing::warn!("could not kill transcoder: {}", err);
            }
            (child.wait().await.map_err(RelayError::Wait)?, true)
        }
    };

    let exit = RelayExit {
        success: status.success(),
        code: status.code(),
        stdout: stdout.await.unwrap_or_default(),
        stderr: stderr.await.unwrap_or_default(),
        cancelled,
    };
    log_exit(&exit, &destination);
    Ok(exit)
}

fn log_exit(exit: &RelayExit, destination: &str) {
    if !exit.stdout.is_empty() {
        tracing::info!("transcoder stdout: {}", exit.stdout);
    }
    if exit.success {
        if !exit.stderr.is_empty() {
            tracing::debug!("transcoder stderr: {}", exit.stderr);
        }
        tracing::info!("stream has been forwarded to relay server: {}", destination);
    } else if exit.cancelled {
        tracing::info!("transcoder for {} stopped", destination);
    } else {
        if !exit.stderr.is_empty() {
            tracing::error!("transcoder stderr: {}", exit.stderr);
        }
        tracing::error!(
            code = ?exit.code,
            "error during transcoder execution for {}",
            destination
        );
    }
}

/// Read `reader` to EOF, keeping only the last `limit` bytes.
async fn capture_tail<R>(reader: Option<R>, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut kept: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                kept.extend_from_slice(&chunk[..n]);
                if kept.len() > limit {
                    let excess = kept.len() - limit;
                    kept.drain(..excess);
                }
            }
            Err(err) => {
                tracing::debug!("transcoder output read ended: {}", err);
                break;
            }
        }
    }
    String::from_utf8_lossy(&kept).trim_end().to_string()
}
