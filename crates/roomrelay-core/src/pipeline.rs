//! The detect -> resolve -> relay pipeline.
//!
//! Each stage ends the run on failure with a logged outcome; nothing is retried.

use crate::config::RelayConfig;
use crate::detector::{
    self, BrowserSession, CdpSession, DetectionOutcome, DetectionStrategy, DetectionTiming,
    IdleRule, NavigationError, SessionError,
};
use crate::relay::{Launcher, RelayError, RelayHandle, RelayTarget, TranscoderLauncher};
use crate::resolver::{Lookup, ResolveError, Resolution, RoomInfoLookup};
use crate::traffic::IdentifierPair;

/// Where a pipeline run ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The transcoder is running; await, cancel or drop the handle.
    Relaying {
        pair: IdentifierPair,
        relay: RelayHandle,
    },
    /// Observation window ended without a complete pair.
    NoIdentifier { partial: IdentifierPair },
    NavigationFailed(NavigationError),
    /// Lookup answered without playback data.
    NotFound { pair: IdentifierPair },
    ResolveFailed {
        pair: IdentifierPair,
        error: ResolveError,
    },
    RelayFailed {
        pair: IdentifierPair,
        error: RelayError,
    },
}

/// Stages of one run, borrowed for its duration.
pub struct Pipeline<'a> {
    pub strategy: &'a dyn DetectionStrategy,
    pub lookup: &'a dyn Lookup,
    pub launcher: &'a dyn Launcher,
    pub timing: DetectionTiming,
}

impl Pipeline<'_> {
    /// Run every stage against `session`, which this call tears down.
    pub async fn run<S>(
        &self,
        session: &mut S,
        target_url: &str,
        relay: &RelayTarget,
    ) -> PipelineOutcome
    where
        S: BrowserSession + ?Sized,
    {
        let pair = match detector::detect(session, self.strategy, target_url, self.timing).await {
            DetectionOutcome::Detected(pair) => pair,
            DetectionOutcome::TimedOut { partial } => {
                return PipelineOutcome::NoIdentifier { partial }
            }
            DetectionOutcome::NavigationFailed(err) => {
                return PipelineOutcome::NavigationFailed(err)
            }
        };

        let playback = match self.lookup.resolve(&pair).await {
            Ok(Resolution::Found(playback)) => playback,
            Ok(Resolution::NotFound) => return PipelineOutcome::NotFound { pair },
            Err(error) => {
                tracing::error!("error fetching room info: {}", error);
                return PipelineOutcome::ResolveFailed { pair, error };
            }
        };

        let destination = relay.destination();
        match self.launcher.launch(&playback, &destination) {
            Ok(relay) => PipelineOutcome::Relaying { pair, relay },
            Err(error) => {
                tracing::error!("error during transcoder execution: {}", error);
                PipelineOutcome::RelayFailed { pair, error }
            }
        }
    }
}

/// Run the whole pipeline with the production stages built from `cfg`.
///
/// Only a browser launch failure is returned as Err; every later failure is
/// a [`PipelineOutcome`]. With `detach` the transcoder's output is not captured
/// so it can outlive this process.
pub async fn run_with_browser(
    cfg: &RelayConfig,
    target_url: &str,
    relay: &RelayTarget,
    detach: bool,
) -> Result<PipelineOutcome, SessionError> {
    let strategy = cfg.variant.strategy(&cfg.detector);
    let lookup = RoomInfoLookup::new(&cfg.lookup, cfg.strip_query());
    let mut launcher = TranscoderLauncher::new(cfg.transcoder.clone());
    if detach {
        launcher = launcher.detached();
    }
    let timing = DetectionTiming::from(&cfg.detector);

    let mut session = CdpSession::launch(
        &cfg.browser,
        strategy.body_marker().map(String::from),
        IdleRule::from(&cfg.detector),
        timing.page_load_timeout,
    )
    .await?;

    let pipeline = Pipeline {
        strategy: strategy.as_ref(),
        lookup: &lookup,
        launcher: &launcher,
        timing,
    };
    Ok(pipeline.run(&mut session, target_url, relay).await)
}
