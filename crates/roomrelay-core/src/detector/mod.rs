//! Room identifier detection from live page traffic.
//!
//! Flow: navigate (observing traffic while the page loads), then keep observing
//! for the configured window. The first of pair complete / window elapsed /
//! navigation failed ends detection, and the session is torn down exactly once.

mod cdp;
mod idle;
mod session;
mod state;
mod strategy;

pub use cdp::CdpSession;
pub use idle::{wait_for_network_idle, IdleRule};
pub use session::BrowserSession;
pub use state::{DetectionMachine, DetectorState};
pub use strategy::{
    DetectionStrategy, RequestInspection, ResponseInspection, UnknownVariant, Variant,
};

use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::{BrowserSettings, DetectorSettings};
use crate::traffic::{IdentifierPair, TrafficEvent};

/// A single traffic event could not be interpreted. Logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum ObservationError {
    #[error("unparsable url {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("response body is not the expected JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("no body captured for {0}")]
    MissingBody(String),
}

/// Page load failed; fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),
    #[error("navigation failed (frame detached or browser error): {0}")]
    Browser(String),
    #[error("session traffic stream already taken")]
    NoTraffic,
}

/// Browser session lifecycle failure.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("launch headless browser: {0}")]
    Launch(String),
    #[error("subscribe to network events: {0}")]
    Listen(String),
    #[error("close browser: {0}")]
    Close(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// Both identifiers were seen; the session is already closed.
    Detected(IdentifierPair),
    /// The observation window ended first. `partial` holds whatever was seen.
    TimedOut { partial: IdentifierPair },
    NavigationFailed(NavigationError),
}

/// Timing for one detection run.
#[derive(Debug, Clone, Copy)]
pub struct DetectionTiming {
    pub observe: Duration,
    pub page_load_timeout: Duration,
}

impl From<&DetectorSettings> for DetectionTiming {
    fn from(s: &DetectorSettings) -> Self {
        Self {
            observe: Duration::from_millis(s.observe_ms),
            page_load_timeout: Duration::from_millis(s.page_load_timeout_ms),
        }
    }
}

impl From<&DetectorSettings> for IdleRule {
    fn from(s: &DetectorSettings) -> Self {
        Self {
            max_inflight: s.idle_max_inflight,
            quiet: Duration::from_millis(s.idle_quiet_ms),
        }
    }
}

/// How the page-load phase ended.
enum LoadPhase {
    Navigated(Result<(), NavigationError>),
    /// The pair completed while the page was still loading.
    Detected,
}

/// Run detection against `target_url` on an already launched session.
pub async fn detect<S>(
    session: &mut S,
    strategy: &dyn DetectionStrategy,
    target_url: &str,
    timing: DetectionTiming,
) -> DetectionOutcome
where
    S: BrowserSession + ?Sized,
{
    let mut machine = DetectionMachine::new();
    let Some(mut events) = session.take_events() else {
        finish(session, &mut machine).await;
        return DetectionOutcome::NavigationFailed(NavigationError::NoTraffic);
    };

    tracing::info!(url = %target_url, strategy = strategy.name(), "navigating to stream page");
    let navigated = {
        let nav = session.navigate(target_url, timing.page_load_timeout);
        tokio::pin!(nav);
        let mut open = true;
        loop {
            tokio::select! {
                res = &mut nav => break LoadPhase::Navigated(res),
                ev = events.recv(), if open => match ev {
                    Some(ev) => {
                        if observe(&mut machine, strategy, &ev).is_some() {
                            break LoadPhase::Detected;
                        }
                    }
                    None => open = false,
                },
            }
        }
    };

    match navigated {
        LoadPhase::Detected => return complete(session, &mut machine).await,
        LoadPhase::Navigated(Err(err)) => {
            tracing::error!("error navigating to the URL: {}", err);
            finish(session, &mut machine).await;
            return DetectionOutcome::NavigationFailed(err);
        }
        LoadPhase::Navigated(Ok(())) => {}
    }

    observe_window(session, &mut machine, strategy, &mut events, timing.observe).await
}

async fn observe_window<S>(
    session: &mut S,
    machine: &mut DetectionMachine,
    strategy: &dyn DetectionStrategy,
    events: &mut mpsc::UnboundedReceiver<TrafficEvent>,
    window: Duration,
) -> DetectionOutcome
where
    S: BrowserSession + ?Sized,
{
    tracing::info!(
        "listening for network traffic for up to {} seconds...",
        window.as_secs_f64()
    );
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    let mut open = true;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            ev = events.recv(), if open => match ev {
                Some(ev) => {
                    if observe(machine, strategy, &ev).is_some() {
                        return complete(session, machine).await;
                    }
                }
                None => open = false,
            },
        }
    }

    tracing::info!("no room id detected after the timeout");
    let partial = machine.pair().clone();
    finish(session, machine).await;
    DetectionOutcome::TimedOut { partial }
}

fn observe(
    machine: &mut DetectionMachine,
    strategy: &dyn DetectionStrategy,
    event: &TrafficEvent,
) -> Option<IdentifierPair> {
    match machine.observe(strategy, event) {
        Ok(Some(pair)) => {
            tracing::info!(room_id = %pair.room_id, aid = %pair.app_id, "room id detected");
            Some(pair)
        }
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(url = %event.url(), "error processing traffic event: {}", err);
            None
        }
    }
}

async fn complete<S>(session: &mut S, machine: &mut DetectionMachine) -> DetectionOutcome
where
    S: BrowserSession + ?Sized,
{
    let pair = machine.pair().clone();
    finish(session, machine).await;
    DetectionOutcome::Detected(pair)
}

/// Tear the session down if it has not been already. Close errors are logged only.
async fn finish<S>(session: &mut S, machine: &mut DetectionMachine)
where
    S: BrowserSession + ?Sized,
{
    if !machine.begin_teardown() {
        return;
    }
    if let Err(err) = session.teardown().await {
        tracing::warn!("error closing the browser: {}", err);
    }
}

/// Launch a headless browser per `browser`, detect, and close it again.
pub async fn detect_with_browser(
    browser: &BrowserSettings,
    settings: &DetectorSettings,
    variant: Variant,
    target_url: &str,
) -> Result<DetectionOutcome, SessionError> {
    let strategy = variant.strategy(settings);
    let timing = DetectionTiming::from(settings);
    let mut session = CdpSession::launch(
        browser,
        strategy.body_marker().map(String::from),
        IdleRule::from(settings),
        timing.page_load_timeout,
    )
    .await?;
    Ok(detect(&mut session, strategy.as_ref(), target_url, timing).await)
}
