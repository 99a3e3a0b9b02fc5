//! Login state machine.
//!
//! ```text
//! AwaitingRedirect -> AwaitingCallback -> Verifying -> Resolving -> Issuing -> Done
//!                                             |            |
//!                                             +--> Failed <+
//! ```
//!
//! Each request walks its own [`LoginAttempt`]; nothing survives between
//! requests. A failure before verification starts (unknown provider, missing
//! token) or during issuance leaves the attempt where it stopped, with the
//! failure recorded but no transition to `Failed`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::error::{AuthError, FailureReason, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoginState {
    /// About to send the browser to the provider.
    AwaitingRedirect,
    /// Waiting for the provider to call back with a token or code.
    AwaitingCallback,
    /// Talking to the provider: code exchange and profile fetch.
    Verifying,
    /// Mapping the external identity to a local user.
    Resolving,
    /// Getting or creating the session token.
    Issuing,
    Done,
    Failed,
}

impl LoginState {
    pub fn can_transition_to(&self, next: LoginState) -> bool {
        use LoginState::*;
        matches!(
            (self, next),
            (AwaitingRedirect, AwaitingCallback)
                | (AwaitingCallback, Verifying)
                | (Verifying, Resolving)
                | (Verifying, Failed)
                | (Resolving, Issuing)
                | (Resolving, Failed)
                | (Issuing, Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoginState::Done | LoginState::Failed)
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginState::AwaitingRedirect => "awaiting_redirect",
            LoginState::AwaitingCallback => "awaiting_callback",
            LoginState::Verifying => "verifying",
            LoginState::Resolving => "resolving",
            LoginState::Issuing => "issuing",
            LoginState::Done => "done",
            LoginState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one login attempt through the state machine.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    provider: String,
    state: LoginState,
    history: Vec<LoginState>,
    failure: Option<FailureReason>,
    started_at: Instant,
}

impl LoginAttempt {
    /// Start at `AwaitingRedirect`, for the redirect endpoint.
    pub fn redirect(provider: impl Into<String>) -> Self {
        Self::starting_at(provider, LoginState::AwaitingRedirect)
    }

    /// Start at `AwaitingCallback`, for a request that already carries a token
    /// or code.
    pub fn callback(provider: impl Into<String>) -> Self {
        Self::starting_at(provider, LoginState::AwaitingCallback)
    }

    fn starting_at(provider: impl Into<String>, state: LoginState) -> Self {
        Self {
            provider: provider.into(),
            state,
            history: vec![state],
            failure: None,
            started_at: Instant::now(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    /// Every state visited so far, starting state included.
    pub fn history(&self) -> &[LoginState] {
        &self.history
    }

    pub fn failure(&self) -> Option<FailureReason> {
        self.failure
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Internal`] when the transition is not allowed.
    pub fn advance(&mut self, next: LoginState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AuthError::Internal(format!(
                "invalid login transition {} -> {}",
                self.state, next
            )));
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Record a failure, moving to `Failed` where the machine allows it.
    pub fn fail(&mut self, reason: FailureReason) {
        self.failure = Some(reason);
        if self.state.can_transition_to(LoginState::Failed) {
            self.state = LoginState::Failed;
            self.history.push(LoginState::Failed);
        }
    }
}
