//! Detection state machine: `AwaitingId -> IdComplete -> TornDown`.
//!
//! Completion and teardown each fire at most once, however many matching
//! events arrive after the pair is already known.

use crate::traffic::{IdentifierPair, TrafficEvent};

use super::strategy::DetectionStrategy;
use super::ObservationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    AwaitingId,
    IdComplete,
    TornDown,
}

#[derive(Debug)]
pub struct DetectionMachine {
    state: DetectorState,
    pair: IdentifierPair,
}

impl Default for DetectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionMachine {
    pub fn new() -> Self {
        Self {
            state: DetectorState::AwaitingId,
            pair: IdentifierPair::default(),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn pair(&self) -> &IdentifierPair {
        &self.pair
    }

    /// Feed one event through `strategy`. Returns the pair on the single
    /// transition into `IdComplete`; every later call is a no-op. A strategy
    /// error is returned only when the pair is still incomplete.
    pub fn observe(
        &mut self,
        strategy: &dyn DetectionStrategy,
        event: &TrafficEvent,
    ) -> Result<Option<IdentifierPair>, ObservationError> {
        if self.state != DetectorState::AwaitingId {
            return Ok(None);
        }
        let observed = strategy.observe(event, &mut self.pair);
        if self.pair.is_complete() {
            // The strategy may fill one half and then fail on the other; a
            // complete pair still completes detection.
            if let Err(err) = observed {
                tracing::warn!("traffic event completed the pair but also failed: {}", err);
            }
            self.state = DetectorState::IdComplete;
            return Ok(Some(self.pair.clone()));
        }
        observed.map(|()| None)
    }

    /// Move to `TornDown`. True only for the first call; the caller closes the
    /// session exactly when this returns true.
    pub fn begin_teardown(&mut self) -> bool {
        if self.state == DetectorState::TornDown {
            return false;
        }
        self.state = DetectorState::TornDown;
        true
    }
}
