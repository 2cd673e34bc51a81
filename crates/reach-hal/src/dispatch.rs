//! Goal submission against any [`ActionClient`].
//!
//! A submitted goal moves `Idle → Submitted → {Succeeded, Failed, TimedOut}`.
//! Two operations cover the two ways of using an endpoint:
//!
//! - [`submit`] hands the goal over and returns its [`GoalHandle`]
//!   (fire-and-forget when the handle is dropped),
//! - [`submit_and_await`] additionally waits for a terminal status, bounded
//!   by a wall-clock deadline.
//!
//! [`dispatch`] keeps the historical "zero timeout means do not wait"
//! convention on top of both.  Deadlines are never retried here.

use std::time::Duration;

use reach_middleware::{ActionClient, GoalHandle};
use reach_types::{ArmError, DispatchOutcome, GoalStatus};
use tracing::{debug, warn};

/// Submit `goal` without waiting for it to finish.
///
/// # Errors
///
/// Propagates the endpoint's refusal, typically
/// [`ArmError::EndpointUnavailable`].
pub async fn submit<C>(client: &C, goal: C::Goal) -> Result<GoalHandle, ArmError>
where
    C: ActionClient + ?Sized,
{
    let handle = client.send_goal(goal).await?;
    debug!(endpoint = %client.name(), goal_id = %handle.id(), "goal submitted");
    Ok(handle)
}

/// Submit `goal` and wait up to `timeout` for a terminal status.
pub async fn submit_and_await<C>(client: &C, goal: C::Goal, timeout: Duration) -> DispatchOutcome
where
    C: ActionClient + ?Sized,
{
    let mut handle = match submit(client, goal).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(endpoint = %client.name(), error = %e, "goal could not be submitted");
            return DispatchOutcome::Unavailable;
        }
    };
    let status = handle.wait_for_terminal(timeout).await;
    if status != Some(GoalStatus::Succeeded) {
        let e = ArmError::GoalRejectedOrTimedOut {
            endpoint: client.name().to_string(),
            status,
        };
        debug!(goal_id = %handle.id(), error = %e, "goal did not succeed");
    }
    match status {
        Some(GoalStatus::Succeeded) => DispatchOutcome::Succeeded,
        Some(status) => DispatchOutcome::Failed(status),
        None => DispatchOutcome::TimedOut,
    }
}

/// Fire-and-forget when `timeout` is zero, otherwise wait for completion.
pub async fn dispatch<C>(client: &C, goal: C::Goal, timeout: Duration) -> DispatchOutcome
where
    C: ActionClient + ?Sized,
{
    if timeout.is_zero() {
        match submit(client, goal).await {
            Ok(_) => DispatchOutcome::Submitted,
            Err(e) => {
                warn!(endpoint = %client.name(), error = %e, "goal could not be submitted");
                DispatchOutcome::Unavailable
            }
        }
    } else {
        submit_and_await(client, goal, timeout).await
    }
}
