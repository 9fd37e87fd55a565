//! "Network settled" readiness: at most N requests in flight for a quiet period.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Settle rule, `networkidle2` by default (2 requests, 500 ms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleRule {
    pub max_inflight: usize,
    pub quiet: Duration,
}

impl Default for IdleRule {
    fn default() -> Self {
        Self {
            max_inflight: 2,
            quiet: Duration::from_millis(500),
        }
    }
}

/// Wait until the in-flight count published on `inflight` has stayed at or
/// below `rule.max_inflight` for `rule.quiet`. Churn within the limit keeps the
/// running quiet period; only going over the limit restarts it. Returns early
/// if the publisher goes away.
pub async fn wait_for_network_idle(mut inflight: watch::Receiver<usize>, rule: IdleRule) {
    loop {
        while *inflight.borrow_and_update() > rule.max_inflight {
            if inflight.changed().await.is_err() {
                return;
            }
        }

        let deadline = Instant::now() + rule.quiet;
        loop {
            match tokio::time::timeout_at(deadline, inflight.changed()).await {
                Err(_) | Ok(Err(_)) => return,
                Ok(Ok(())) => {
                    if *inflight.borrow_and_update() > rule.max_inflight {
                        break;
                    }
                }
            }
        }
    }
}
