use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{NodeContext, WorkflowError};
use crate::ironic::{ClientError, NodeAdapter, ProvisionApi, ProvisionPayload};
use crate::state_machine::{
    PlanError, Planner, ProvisionState, Step, TransitionAction, WorkflowReport, WorkflowRun,
    is_supported_goal,
};

/// Limits and pacing for one workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub poll_interval: Duration,
    /// Used once a deployment has been requested; deployments are slow.
    pub deploy_poll_interval: Duration,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub recovery_retries: u32,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            deploy_poll_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(30 * 60),
            max_attempts: 1000,
            recovery_retries: 3,
        }
    }
}

/// Progress notifications emitted while a workflow runs.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Observed(ProvisionState),
    Issued(TransitionAction),
    Recovering {
        state: ProvisionState,
        action: TransitionAction,
    },
    PollFailed(String),
}

pub trait WorkflowObserver: Send + Sync {
    fn on_event(&self, node_id: &str, event: &WorkflowEvent);
}

impl WorkflowObserver for () {
    fn on_event(&self, _node_id: &str, _event: &WorkflowEvent) {}
}

enum Guarded<T> {
    Done(T),
    Cancelled,
    Expired,
}

/// Race `fut` against cancellation and the run's deadline.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    deadline: Instant,
    fut: F,
) -> Guarded<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Guarded::Cancelled,
        _ = sleep_until(deadline) => Guarded::Expired,
        out = fut => Guarded::Done(out),
    }
}

/// A rejected request, kept until the next tick shows whether the node moved.
struct Rejection {
    state: ProvisionState,
    action: TransitionAction,
    error: ClientError,
}

/// Drives one node at a time through Ironic's state machine toward a goal.
///
/// Holds only immutable data, so a single instance can be shared (behind an
/// `Arc`) by concurrent runs for different nodes.
pub struct ProvisionWorkflow<A> {
    adapter: NodeAdapter<A>,
    planner: Planner,
    options: WorkflowOptions,
}

impl<A: ProvisionApi> ProvisionWorkflow<A> {
    pub fn new(adapter: NodeAdapter<A>, planner: Planner, options: WorkflowOptions) -> Self {
        Self {
            adapter,
            planner,
            options,
        }
    }

    pub fn adapter(&self) -> &NodeAdapter<A> {
        &self.adapter
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    pub async fn run(
        &self,
        node_id: &str,
        goal: TransitionAction,
        payload: &ProvisionPayload,
        cancel: &CancellationToken,
    ) -> Result<WorkflowReport, WorkflowError> {
        self.run_observed(node_id, goal, payload, cancel, &()).await
    }

    /// Poll, plan and issue until the goal is reached or the run fails.
    ///
    /// Each tick re-fetches the node; nothing observed on an earlier tick is
    /// trusted. Fetch failures other than a missing node or an unknown state
    /// are logged and retried on the next tick.
    pub async fn run_observed(
        &self,
        node_id: &str,
        goal: TransitionAction,
        payload: &ProvisionPayload,
        cancel: &CancellationToken,
        observer: &dyn WorkflowObserver,
    ) -> Result<WorkflowReport, WorkflowError> {
        if !is_supported_goal(goal) {
            return Err(WorkflowError::UnsupportedTarget(goal));
        }

        let mut run = WorkflowRun::new(node_id, goal, self.options.recovery_retries)
            .with_steps(payload.has_clean_steps(), payload.has_service_steps());
        let deadline = deadline_after(self.options.timeout);
        let mut interval = self.options.poll_interval;
        let mut pending_rejection: Option<Rejection> = None;

        info!(node = node_id, run_id = %run.id, %goal, "beginning provisioning workflow");

        while run.attempts < self.options.max_attempts && Instant::now() < deadline {
            run.attempts += 1;

            let status = match guarded(cancel, deadline, self.adapter.get_state(node_id)).await {
                Guarded::Cancelled => return Err(cancelled(&run)),
                Guarded::Expired => break,
                Guarded::Done(Ok(status)) => status,
                Guarded::Done(Err(e)) => {
                    if matches!(e, ClientError::NotFound { .. } | ClientError::UnknownState(_)) {
                        return Err(WorkflowError::Client {
                            context: context(&run),
                            source: e,
                        });
                    }
                    warn!(node = node_id, error = %e, "failed to fetch node state, will retry");
                    observer.on_event(node_id, &WorkflowEvent::PollFailed(e.to_string()));
                    if let Guarded::Cancelled = guarded(cancel, deadline, sleep(interval)).await {
                        return Err(cancelled(&run));
                    }
                    continue;
                }
            };

            let state = status.state;
            run.observe(state, status.last_error);
            observer.on_event(node_id, &WorkflowEvent::Observed(state));
            debug!(node = node_id, %state, target = ?status.target, "node state");

            let rejection = pending_rejection.take();

            match self.planner.next(&mut run, state) {
                Step::Done => {
                    info!(node = node_id, %state, attempts = run.attempts, "provisioning workflow complete");
                    return Ok(WorkflowReport::from_run(&run));
                }
                Step::Wait => {
                    debug!(node = node_id, %state, "waiting for ironic to finish");
                }
                Step::Fatal(e) => return Err(plan_failure(&run, e)),
                Step::Issue(planned) => {
                    if let Some(rejection) = rejection {
                        if rejection.state == state {
                            return Err(WorkflowError::RequestRejected {
                                context: context(&run),
                                action: rejection.action,
                                source: rejection.error,
                            });
                        }
                    }

                    let action = planned.action;
                    if planned.recovery {
                        warn!(node = node_id, %state, %action, "node is in a failure state, attempting recovery");
                        observer.on_event(node_id, &WorkflowEvent::Recovering { state, action });
                    } else {
                        info!(node = node_id, %state, %action, "requesting transition");
                    }
                    if action == TransitionAction::Active {
                        interval = self.options.deploy_poll_interval;
                    }

                    let request = self.adapter.request_transition(node_id, action, payload);
                    match guarded(cancel, deadline, request).await {
                        Guarded::Cancelled => return Err(cancelled(&run)),
                        Guarded::Expired => break,
                        Guarded::Done(Ok(())) => {
                            run.record_issued(action, planned.starts_operation);
                            observer.on_event(node_id, &WorkflowEvent::Issued(action));
                        }
                        Guarded::Done(Err(e)) if state.is_terminal_failure() => {
                            return Err(request_failure(&run, action, e));
                        }
                        Guarded::Done(Err(e @ ClientError::RequestRejected { .. })) => {
                            warn!(node = node_id, %state, %action, error = %e, "transition rejected, re-checking node");
                            pending_rejection = Some(Rejection {
                                state,
                                action,
                                error: e,
                            });
                        }
                        Guarded::Done(Err(e)) if !e.is_transient() => {
                            return Err(request_failure(&run, action, e));
                        }
                        Guarded::Done(Err(e)) => {
                            warn!(node = node_id, %state, %action, error = %e, "transition request failed, will retry");
                        }
                    }
                }
            }

            if let Guarded::Cancelled = guarded(cancel, deadline, sleep(interval)).await {
                return Err(cancelled(&run));
            }
        }

        warn!(node = node_id, attempts = run.attempts, %goal, "provisioning workflow timed out");
        Err(WorkflowError::Timeout {
            context: context(&run),
            goal,
            attempts: run.attempts,
        })
    }
}

/// Timeouts too large to represent are treated as effectively unbounded.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

// Roughly 30 years.
const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

fn context(run: &WorkflowRun) -> NodeContext {
    NodeContext {
        node: run.node_id.clone(),
        state: run.last_state(),
        last_error: run.last_error.clone(),
    }
}

fn cancelled(run: &WorkflowRun) -> WorkflowError {
    info!(node = %run.node_id, "provisioning workflow cancelled");
    WorkflowError::Cancelled {
        context: context(run),
    }
}

fn plan_failure(run: &WorkflowRun, err: PlanError) -> WorkflowError {
    match err {
        PlanError::TerminalFailure { reason, .. } => WorkflowError::TerminalFailure {
            context: context(run),
            reason,
        },
        PlanError::NoValidTransition { goal, .. } => WorkflowError::NoValidTransition {
            context: context(run),
            goal,
        },
        PlanError::UnsupportedTarget(goal) => WorkflowError::UnsupportedTarget(goal),
    }
}

fn request_failure(run: &WorkflowRun, action: TransitionAction, err: ClientError) -> WorkflowError {
    match err {
        e @ ClientError::RequestRejected { .. } => WorkflowError::RequestRejected {
            context: context(run),
            action,
            source: e,
        },
        e => WorkflowError::Client {
            context: context(run),
            source: e,
        },
    }
}
