//! Strategies that pace the polling of a call's status.
//!
//! A strategy is consulted every time a poll observed a non-terminal status.
//! Returning an error aborts polling with that error; returning `Ok(())`
//! lets the next poll happen. Strategies are stateful, so every polling run
//! needs a fresh instance.

use crate::agent::{Agent, RequestStatusResponse};
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use ic_agent_types::messages::RequestStatus;
use ic_agent_types::RequestId;
use ic_principal::Principal;
use slog::{debug, warn};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Initial delay of the default strategy before the first backoff step.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_secs(1);

pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.2;

/// How long the default strategy polls before giving up.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[async_trait]
pub trait PollStrategy: Send {
    async fn next(
        &mut self,
        canister_id: &Principal,
        request_id: &RequestId,
        status: RequestStatus,
    ) -> AgentResult<()>;
}

/// Yields `true` on its first invocation and `false` on every later one.
pub fn once() -> impl FnMut(&Principal, &RequestId, RequestStatus) -> bool + Send {
    let mut first = true;
    move |_, _, _| std::mem::replace(&mut first, false)
}

/// Sleeps for a fixed duration whenever the predicate holds.
pub struct ConditionalDelay<P> {
    predicate: P,
    delay: Duration,
}

pub fn conditional_delay<P>(predicate: P, delay: Duration) -> ConditionalDelay<P>
where
    P: FnMut(&Principal, &RequestId, RequestStatus) -> bool + Send,
{
    ConditionalDelay { predicate, delay }
}

#[async_trait]
impl<P> PollStrategy for ConditionalDelay<P>
where
    P: FnMut(&Principal, &RequestId, RequestStatus) -> bool + Send,
{
    async fn next(
        &mut self,
        canister_id: &Principal,
        request_id: &RequestId,
        status: RequestStatus,
    ) -> AgentResult<()> {
        if (self.predicate)(canister_id, request_id, status) {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

/// Sleeps for a duration that grows by `factor` after every invocation. The
/// duration saturates at [`Duration::MAX`] and never drops below zero.
pub struct Backoff {
    current: Duration,
    factor: f64,
}

pub fn backoff(initial: Duration, factor: f64) -> Backoff {
    Backoff {
        current: initial,
        factor,
    }
}

#[async_trait]
impl PollStrategy for Backoff {
    async fn next(
        &mut self,
        _canister_id: &Principal,
        _request_id: &RequestId,
        _status: RequestStatus,
    ) -> AgentResult<()> {
        tokio::time::sleep(self.current).await;
        let next = self.current.as_secs_f64() * self.factor;
        self.current = if next.is_nan() || next <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(next).unwrap_or(Duration::MAX)
        };
        Ok(())
    }
}

/// Fails with [`AgentError::Timeout`] once the deadline, fixed when the
/// strategy is created, has been reached.
pub struct Timeout {
    deadline: Instant,
}

pub fn timeout(duration: Duration) -> Timeout {
    Timeout {
        deadline: Instant::now() + duration,
    }
}

#[async_trait]
impl PollStrategy for Timeout {
    async fn next(
        &mut self,
        _canister_id: &Principal,
        _request_id: &RequestId,
        _status: RequestStatus,
    ) -> AgentResult<()> {
        if Instant::now() >= self.deadline {
            return Err(AgentError::Timeout);
        }
        Ok(())
    }
}

/// Runs strategies in order and stops at the first failure.
pub struct Chain {
    strategies: Vec<Box<dyn PollStrategy>>,
}

pub fn chain(strategies: Vec<Box<dyn PollStrategy>>) -> Chain {
    Chain { strategies }
}

#[async_trait]
impl PollStrategy for Chain {
    async fn next(
        &mut self,
        canister_id: &Principal,
        request_id: &RequestId,
        status: RequestStatus,
    ) -> AgentResult<()> {
        for strategy in self.strategies.iter_mut() {
            strategy.next(canister_id, request_id, status).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PollStrategy for Box<dyn PollStrategy> {
    async fn next(
        &mut self,
        canister_id: &Principal,
        request_id: &RequestId,
        status: RequestStatus,
    ) -> AgentResult<()> {
        self.as_mut().next(canister_id, request_id, status).await
    }
}

/// Waits one second before the first poll, then backs off from one second
/// by a factor of 1.2 and gives up after five minutes.
pub fn default_strategy() -> Chain {
    chain(vec![
        Box::new(conditional_delay(once(), DEFAULT_INITIAL_DELAY)),
        Box::new(backoff(DEFAULT_BACKOFF_INITIAL, DEFAULT_BACKOFF_FACTOR)),
        Box::new(timeout(DEFAULT_POLL_TIMEOUT)),
    ])
}

/// Polls the certified status of `request_id` until the call has an
/// outcome.
///
/// Every poll verifies the returned certificate. Between polls that observed
/// a non-terminal status, `strategy` decides how long to wait and whether to
/// go on. Nothing else bounds the loop, so a strategy without a timeout may
/// poll forever. Cancelling `cancel` stops polling at the next status request
/// or strategy wait.
pub async fn poll_for_response<S>(
    agent: &Agent,
    canister_id: &Principal,
    request_id: &RequestId,
    strategy: &mut S,
    cancel: &CancellationToken,
) -> AgentResult<Vec<u8>>
where
    S: PollStrategy + ?Sized,
{
    let log = agent.logger();
    loop {
        if cancel.is_cancelled() {
            warn!(log, "polling cancelled"; "request_id" => %request_id);
            return Err(AgentError::Cancelled);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(log, "polling cancelled"; "request_id" => %request_id);
                return Err(AgentError::Cancelled);
            }
            response = agent.request_status(canister_id, request_id) => response?,
        };
        let status = response.status();
        debug!(log, "polled request status";
            "canister_id" => %canister_id,
            "request_id" => %request_id,
            "status" => %status);

        match response {
            RequestStatusResponse::Replied(reply) => return Ok(reply),
            RequestStatusResponse::Rejected {
                reject_code,
                reject_message,
            } => {
                warn!(log, "call was rejected";
                    "request_id" => %request_id,
                    "reject_code" => reject_code,
                    "reject_message" => &reject_message);
                return Err(AgentError::CallRejected {
                    reject_code,
                    reject_message,
                });
            }
            RequestStatusResponse::Done => return Err(AgentError::DoneWithoutReply),
            RequestStatusResponse::Unknown
            | RequestStatusResponse::Received
            | RequestStatusResponse::Processing => {}
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(log, "polling cancelled"; "request_id" => %request_id);
                return Err(AgentError::Cancelled);
            }
            next = strategy.next(canister_id, request_id, status) => next,
        };
        if let Err(err) = next {
            warn!(log, "giving up polling"; "request_id" => %request_id, "error" => %err);
            return Err(err);
        }
    }
}
