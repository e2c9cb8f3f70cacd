//! Session lifecycle state machine and reconnect policy.
//!
//! A session walks `connect → login → join`. Each stage is retried on its own
//! under a shared [`ReconnectPolicy`]; the attempt counter resets whenever a
//! stage succeeds and the session moves on.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Connection state as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Connect, login or join is in flight.
    Connecting,
    /// Joined and ready.
    Connected,
}

/// Lifecycle stage a retry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    Reconnect,
    Login,
    Join,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reconnect => "reconnect",
            Self::Login => "login",
            Self::Join => "join",
        })
    }
}

/// The session ran out of retries at one lifecycle stage.
///
/// Returned to the owning process instead of exiting, so it decides how to
/// shut down and which exit code to use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("session gave up on {stage} after {attempts} retries")]
pub struct FatalError {
    pub stage: LifecycleStage,
    pub attempts: u32,
}

/// Bounded-retry policy with a fixed backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    max_attempts: i32,
    backoff: Duration,
}

impl ReconnectPolicy {
    /// `max_attempts < 0` means unbounded.
    pub fn new(max_attempts: i32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts < 0
    }
}

/// Outcome of asking the state machine for another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep `backoff`, then retry. `attempt` is the 1-based retry number.
    Retry { attempt: u32, backoff: Duration },
    /// No retries left.
    Exhausted(FatalError),
}

/// Connection lifecycle and retry bookkeeping.
///
/// Owned by the dispatcher; nothing else mutates it.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
    policy: ReconnectPolicy,
    attempt_count: u32,
    reconnect_enabled: bool,
}

impl SessionStateMachine {
    /// `reconnect_enabled` controls bounded retries until the first successful
    /// join; after that they are always enabled.
    pub fn new(policy: ReconnectPolicy, reconnect_enabled: bool) -> Self {
        Self {
            state: SessionState::Disconnected,
            policy,
            attempt_count: 0,
            reconnect_enabled,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect_enabled
    }

    /// A connect attempt was issued.
    pub fn begin_connecting(&mut self) {
        self.state = SessionState::Connecting;
    }

    /// The connection dropped or was torn down.
    pub fn on_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
    }

    /// A stage succeeded and the session moves to the next one.
    pub fn on_stage_succeeded(&mut self) {
        self.attempt_count = 0;
    }

    /// The join was confirmed.
    pub fn on_connected(&mut self) {
        self.state = SessionState::Connected;
        self.attempt_count = 0;
        self.reconnect_enabled = true;
    }

    /// Consumes one retry for `stage`, or reports exhaustion.
    ///
    /// Unbounded policies retry even while reconnection is disabled.
    pub fn next_retry(&mut self, stage: LifecycleStage) -> RetryDecision {
        if !self.retry_allowed() {
            return RetryDecision::Exhausted(FatalError {
                stage,
                attempts: self.attempt_count,
            });
        }
        self.attempt_count = self.attempt_count.saturating_add(1);
        RetryDecision::Retry {
            attempt: self.attempt_count,
            backoff: self.policy.backoff,
        }
    }

    fn retry_allowed(&self) -> bool {
        if self.policy.is_unbounded() {
            return true;
        }
        self.reconnect_enabled && i64::from(self.attempt_count) < i64::from(self.policy.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(max: i32) -> SessionStateMachine {
        SessionStateMachine::new(ReconnectPolicy::new(max, Duration::ZERO), true)
    }

    #[test]
    fn unbounded_policy_never_exhausts() {
        let mut sm = machine(-1);
        for expected in 1..=1_000 {
            match sm.next_retry(LifecycleStage::Reconnect) {
                RetryDecision::Retry { attempt, .. } => assert_eq!(attempt, expected),
                other => panic!("unexpected decision: {other:?}"),
            }
        }
        assert_eq!(sm.attempt_count(), 1_000);
    }

    #[test]
    fn bounded_policy_exhausts_on_failure_n_plus_one() {
        let mut sm = machine(3);
        for _ in 0..3 {
            assert!(matches!(
                sm.next_retry(LifecycleStage::Login),
                RetryDecision::Retry { .. }
            ));
        }
        assert_eq!(
            sm.next_retry(LifecycleStage::Login),
            RetryDecision::Exhausted(FatalError {
                stage: LifecycleStage::Login,
                attempts: 3,
            })
        );
    }

    #[test]
    fn zero_attempts_exhausts_immediately() {
        let mut sm = machine(0);
        assert!(matches!(
            sm.next_retry(LifecycleStage::Join),
            RetryDecision::Exhausted(_)
        ));
    }

    #[test]
    fn stage_success_resets_counter() {
        let mut sm = machine(2);
        sm.next_retry(LifecycleStage::Reconnect);
        sm.next_retry(LifecycleStage::Reconnect);
        sm.on_stage_succeeded();
        assert_eq!(sm.attempt_count(), 0);
        assert!(matches!(
            sm.next_retry(LifecycleStage::Login),
            RetryDecision::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn disabled_reconnect_blocks_bounded_retries_only() {
        let policy = ReconnectPolicy::new(5, Duration::ZERO);
        let mut bounded = SessionStateMachine::new(policy, false);
        assert!(matches!(
            bounded.next_retry(LifecycleStage::Reconnect),
            RetryDecision::Exhausted(_)
        ));

        let unbounded_policy = ReconnectPolicy::new(-1, Duration::ZERO);
        let mut unbounded = SessionStateMachine::new(unbounded_policy, false);
        assert!(matches!(
            unbounded.next_retry(LifecycleStage::Reconnect),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn connected_enables_reconnect_and_resets() {
        let mut sm = SessionStateMachine::new(ReconnectPolicy::new(1, Duration::ZERO), false);
        sm.begin_connecting();
        assert_eq!(sm.state(), SessionState::Connecting);

        sm.on_connected();
        assert_eq!(sm.state(), SessionState::Connected);
        assert!(sm.reconnect_enabled());
        assert_eq!(sm.attempt_count(), 0);

        sm.on_disconnected();
        assert_eq!(sm.state(), SessionState::Disconnected);
    }
}
