use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

use super::client::ProvisionApi;
use super::error::ClientError;
use super::types::{NodeStatus, ProvisionPayload, ProvisionStateRequest};
use crate::state_machine::TransitionAction;

/// Backoff applied when Ironic answers a transition with 409 (node locked).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusyRetry {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after that.
    pub initial_delay_ms: u64,
}

impl Default for BusyRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 5000,
        }
    }
}

impl BusyRetry {
    /// Upper bound for a single backoff sleep.
    pub const MAX_DELAY: Duration = Duration::from_secs(300);

    /// delay = initial_delay_ms * 2^(attempt - 1), capped at [`Self::MAX_DELAY`].
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor)).min(Self::MAX_DELAY)
    }
}

/// Reads node state and requests transitions, respecting Ironic's own
/// locking by backing off on busy responses.
///
/// Nothing is cached: every call goes to the remote service.
pub struct NodeAdapter<A> {
    api: A,
    busy_retry: BusyRetry,
}

impl<A: ProvisionApi> NodeAdapter<A> {
    pub fn new(api: A, busy_retry: BusyRetry) -> Self {
        Self { api, busy_retry }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn get_state(&self, node_id: &str) -> Result<NodeStatus, ClientError> {
        let node = self.api.get_node(node_id).await?;
        NodeStatus::try_from(node)
    }

    /// Issue `action`, retrying only while the node is locked.
    ///
    /// Rejections other than 409 are returned immediately: the server's
    /// answer is authoritative.
    pub async fn request_transition(
        &self,
        node_id: &str,
        action: TransitionAction,
        payload: &ProvisionPayload,
    ) -> Result<(), ClientError> {
        let req = ProvisionStateRequest::for_action(action, payload);
        let max_attempts = self.busy_retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.api.set_provision_state(node_id, &req).await {
                Ok(()) => return Ok(()),
                Err(ClientError::Busy { .. }) if attempt < max_attempts => {
                    let delay = self.busy_retry.delay_for_attempt(attempt);
                    debug!(
                        node = node_id,
                        %action,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "ironic is busy, will retry"
                    );
                    sleep(delay).await;
                }
                Err(ClientError::Busy { .. }) => break,
                Err(e) => return Err(e),
            }
        }

        Err(ClientError::Busy {
            attempts: max_attempts,
        })
    }
}
