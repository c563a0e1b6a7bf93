//! Login flow lifecycle.
//!
//! `Idle → RedirectIssued → CallbackReceived → ExchangePending → Authenticated`,
//! with `Failed` reachable from every non-terminal stage. Terminal stages have
//! no outgoing edges, which is what keeps a consumed authorization code from
//! being exchanged twice within one flow.

use crate::error::{OAuth2Error, OAuth2Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStage {
    Idle,
    RedirectIssued,
    CallbackReceived,
    ExchangePending,
    Authenticated,
    Failed,
}

impl FlowStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowStage::Authenticated | FlowStage::Failed)
    }

    pub fn can_transition_to(self, next: FlowStage) -> bool {
        use FlowStage::*;

        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, RedirectIssued)
            | (RedirectIssued, CallbackReceived)
            | (CallbackReceived, ExchangePending)
            | (ExchangePending, Authenticated) => true,
            _ => false,
        }
    }
}

/// Tracks one flow, identified by its `state` token.
#[derive(Debug)]
pub struct FlowTracker {
    state: String,
    stage: FlowStage,
}

impl FlowTracker {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            stage: FlowStage::Idle,
        }
    }

    /// Pick up a flow whose redirect was issued by an earlier request.
    pub fn resume(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            stage: FlowStage::RedirectIssued,
        }
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn advance(&mut self, next: FlowStage) -> OAuth2Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(OAuth2Error::InvalidFlowTransition {
                from: self.stage,
                to: next,
            });
        }
        debug!("Flow {}: {:?} -> {:?}", self.state, self.stage, next);
        self.stage = next;
        Ok(())
    }

    /// Move to `Failed` and hand the error back for propagation.
    pub fn fail(&mut self, err: OAuth2Error) -> OAuth2Error {
        error!(
            "Flow {} failed during {:?} ({:?}): {}",
            self.state,
            self.stage,
            err.kind(),
            err
        );
        if self.stage.can_transition_to(FlowStage::Failed) {
            self.stage = FlowStage::Failed;
        }
        err
    }
}
