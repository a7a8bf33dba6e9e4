use thiserror::Error;

use super::run::WorkflowRun;
use super::state::{ProvisionState, TransitionAction};
use super::table::TransitionTable;

use ProvisionState as S;
use TransitionAction as A;

/// Outcomes a caller can ask the workflow to reach.
pub const SUPPORTED_GOALS: [TransitionAction; 7] = [
    A::Manage,
    A::Provide,
    A::Active,
    A::Deleted,
    A::Clean,
    A::Inspect,
    A::Service,
];

pub fn is_supported_goal(goal: TransitionAction) -> bool {
    SUPPORTED_GOALS.contains(&goal)
}

/// A single action the planner wants issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedAction {
    pub action: TransitionAction,
    /// The action moves the node out of a failure state.
    pub recovery: bool,
    /// Accepting the action starts the goal's own operation (clean, inspect,
    /// service).
    pub starts_operation: bool,
}

/// What the driver should do after observing a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The goal is satisfied.
    Done,
    /// Ironic is working; poll again.
    Wait,
    Issue(PlannedAction),
    Fatal(PlanError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("node is in terminal failure state '{state}': {reason}")]
    TerminalFailure { state: ProvisionState, reason: String },

    #[error("no valid transition from '{state}' toward '{goal}'")]
    NoValidTransition {
        state: ProvisionState,
        goal: TransitionAction,
    },

    #[error("'{0}' is not a supported provisioning target")]
    UnsupportedTarget(TransitionAction),
}

/// Picks the next single transition toward a goal.
///
/// Multi-hop routes are an explicit per-goal decision table rather than a
/// search over the transition table; the table is only used to confirm that
/// whatever gets picked is legal from the current state.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    table: TransitionTable,
}

impl Planner {
    pub fn new(table: TransitionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Decide what to do with a node observed in `state`.
    ///
    /// Evaluation order: goal reached, transient (wait), failure recovery,
    /// forward hop. Recovery consumes the run's retry budget.
    pub fn next(&self, run: &mut WorkflowRun, state: ProvisionState) -> Step {
        if !is_supported_goal(run.goal) {
            return Step::Fatal(PlanError::UnsupportedTarget(run.goal));
        }
        if goal_reached(run, state) {
            return Step::Done;
        }
        if state.is_transient() {
            return Step::Wait;
        }
        if state.is_terminal_failure() {
            return self.recover(run, state);
        }

        match forward_hop(run.goal, state, run.operation_started) {
            Some(action) => self.issue(run.goal, state, action, false),
            None => Step::Fatal(PlanError::NoValidTransition {
                state,
                goal: run.goal,
            }),
        }
    }

    fn recover(&self, run: &mut WorkflowRun, state: ProvisionState) -> Step {
        let Some(action) = recovery_action(run.goal, state) else {
            if self.table.valid_transitions_from(state).is_empty() {
                return Step::Fatal(PlanError::TerminalFailure {
                    state,
                    reason: "no recovery action is defined".to_string(),
                });
            }
            return Step::Fatal(PlanError::NoValidTransition {
                state,
                goal: run.goal,
            });
        };

        if run.recovery_budget == 0 {
            return Step::Fatal(PlanError::TerminalFailure {
                state,
                reason: format!(
                    "recovery retries exhausted after {} attempt(s)",
                    run.recoveries_used
                ),
            });
        }

        let step = self.issue(run.goal, state, action, true);
        if matches!(step, Step::Issue(_)) {
            run.recovery_budget -= 1;
            run.recoveries_used += 1;
            run.operation_started = false;
        }
        step
    }

    fn issue(
        &self,
        goal: TransitionAction,
        state: ProvisionState,
        action: TransitionAction,
        recovery: bool,
    ) -> Step {
        if !self.table.is_legal_transition(state, action) {
            return Step::Fatal(PlanError::NoValidTransition { state, goal });
        }
        Step::Issue(PlannedAction {
            action,
            recovery,
            starts_operation: action == goal
                && matches!(action, A::Clean | A::Inspect | A::Service),
        })
    }
}

fn goal_reached(run: &WorkflowRun, state: ProvisionState) -> bool {
    match run.goal {
        A::Manage => state == S::Manageable,
        A::Provide => state == S::Available,
        A::Active => state == S::Active,
        A::Deleted => matches!(state, S::Manageable | S::Available | S::Enroll),
        // Ironic refuses manual cleaning without steps; nothing to do once manageable.
        A::Clean => state == S::Manageable && (run.operation_started || !run.has_clean_steps),
        A::Inspect => state == S::Manageable && run.operation_started,
        A::Service => state == S::Active && (run.operation_started || !run.has_service_steps),
        _ => false,
    }
}

fn forward_hop(
    goal: TransitionAction,
    state: ProvisionState,
    operation_started: bool,
) -> Option<TransitionAction> {
    if state.is_hold() {
        return Some(A::Unhold);
    }

    match goal {
        A::Manage => match state {
            S::Enroll | S::Available => Some(A::Manage),
            _ => None,
        },
        A::Provide => match state {
            S::Manageable => Some(A::Provide),
            S::Enroll => Some(A::Manage),
            _ => None,
        },
        A::Active => match state {
            S::Available => Some(A::Active),
            S::Manageable => Some(A::Provide),
            S::Enroll => Some(A::Manage),
            S::Rescue => Some(A::Unrescue),
            _ => None,
        },
        A::Deleted => match state {
            S::Active | S::Rescue => Some(A::Deleted),
            _ => None,
        },
        // Once the operation is underway the node must come back to the
        // goal state by itself.
        A::Clean | A::Inspect | A::Service if operation_started => None,
        A::Clean | A::Inspect => match state {
            S::Manageable => Some(goal),
            S::Enroll | S::Available => Some(A::Manage),
            _ => None,
        },
        A::Service => match state {
            S::Active => Some(A::Service),
            _ => None,
        },
        _ => None,
    }
}

/// Recovery wins over any forward action that happens to be legal from the
/// failure state as well (e.g. `deploy failed --active-->`).
fn recovery_action(goal: TransitionAction, state: ProvisionState) -> Option<TransitionAction> {
    match state {
        S::DeployFailed | S::Error => {
            matches!(goal, A::Active | A::Provide | A::Deleted).then_some(A::Deleted)
        }
        S::CleanFailed | S::InspectFailed | S::AdoptFailed => {
            (goal != A::Service).then_some(A::Manage)
        }
        S::RescueFailed | S::UnrescueFailed => match goal {
            A::Active => Some(A::Unrescue),
            A::Deleted => Some(A::Deleted),
            _ => None,
        },
        S::ServiceFailed => {
            matches!(goal, A::Active | A::Service | A::Deleted).then_some(A::Abort)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_for(goal: TransitionAction) -> WorkflowRun {
        WorkflowRun::new("node-1", goal, 3)
    }

    fn issued(step: Step) -> TransitionAction {
        match step {
            Step::Issue(planned) => planned.action,
            other => panic!("expected an action, got {other:?}"),
        }
    }

    #[test]
    fn done_at_canonical_states() {
        let planner = Planner::default();
        let cases = [
            (A::Manage, S::Manageable),
            (A::Provide, S::Available),
            (A::Active, S::Active),
            (A::Deleted, S::Manageable),
            (A::Deleted, S::Available),
            (A::Deleted, S::Enroll),
            (A::Clean, S::Manageable),
            (A::Service, S::Active),
        ];
        for (goal, state) in cases {
            let mut run = run_for(goal);
            assert_eq!(planner.next(&mut run, state), Step::Done, "{goal} at {state}");
        }
    }

    #[test]
    fn waits_in_transient_states() {
        let planner = Planner::default();
        for state in [S::Deploying, S::DeployWait, S::Cleaning, S::Verifying, S::Deleting] {
            let mut run = run_for(A::Active);
            assert_eq!(planner.next(&mut run, state), Step::Wait);
        }
    }

    #[test]
    fn active_from_enroll_walks_through_manage_and_provide() {
        let planner = Planner::default();
        let mut run = run_for(A::Active);
        assert_eq!(issued(planner.next(&mut run, S::Enroll)), A::Manage);
        assert_eq!(issued(planner.next(&mut run, S::Manageable)), A::Provide);
        assert_eq!(issued(planner.next(&mut run, S::Available)), A::Active);
        assert_eq!(run.recoveries_used, 0);
    }

    #[test]
    fn deploy_failed_tears_down_before_redeploying() {
        let planner = Planner::default();
        let mut run = run_for(A::Active);
        let step = planner.next(&mut run, S::DeployFailed);
        assert_eq!(
            step,
            Step::Issue(PlannedAction {
                action: A::Deleted,
                recovery: true,
                starts_operation: false,
            })
        );
        assert_eq!(run.recovery_budget, 2);
        assert_eq!(run.recoveries_used, 1);
    }

    #[test]
    fn recovery_budget_is_bounded() {
        let planner = Planner::default();
        let mut run = run_for(A::Provide);
        for _ in 0..3 {
            assert_eq!(issued(planner.next(&mut run, S::CleanFailed)), A::Manage);
        }
        match planner.next(&mut run, S::CleanFailed) {
            Step::Fatal(PlanError::TerminalFailure { state, reason }) => {
                assert_eq!(state, S::CleanFailed);
                assert!(reason.contains("exhausted"));
            }
            other => panic!("expected terminal failure, got {other:?}"),
        }
        assert_eq!(run.recovery_budget, 0);
    }

    #[test]
    fn error_state_cannot_reach_inspect() {
        let planner = Planner::default();
        let mut run = run_for(A::Inspect);
        assert_eq!(
            planner.next(&mut run, S::Error),
            Step::Fatal(PlanError::NoValidTransition {
                state: S::Error,
                goal: A::Inspect
            })
        );
        assert_eq!(run.recovery_budget, 3);
    }

    #[test]
    fn failure_state_without_exits_is_terminal() {
        let planner = Planner::new(TransitionTable::from_transitions(Vec::new()));
        let mut run = run_for(A::Inspect);
        assert!(matches!(
            planner.next(&mut run, S::Error),
            Step::Fatal(PlanError::TerminalFailure { .. })
        ));
    }

    #[test]
    fn clean_goes_through_manageable_once() {
        let planner = Planner::default();
        let mut run = run_for(A::Clean).with_steps(true, false);

        assert_eq!(issued(planner.next(&mut run, S::Available)), A::Manage);
        run.record_issued(A::Manage, false);

        let step = planner.next(&mut run, S::Manageable);
        assert_eq!(
            step,
            Step::Issue(PlannedAction {
                action: A::Clean,
                recovery: false,
                starts_operation: true,
            })
        );
        run.record_issued(A::Clean, true);

        assert_eq!(planner.next(&mut run, S::CleanWait), Step::Wait);
        assert_eq!(planner.next(&mut run, S::Manageable), Step::Done);
    }

    #[test]
    fn started_operation_rejects_unexpected_stable_state() {
        let planner = Planner::default();
        let mut run = run_for(A::Inspect);
        run.record_issued(A::Inspect, true);
        assert!(matches!(
            planner.next(&mut run, S::Available),
            Step::Fatal(PlanError::NoValidTransition { .. })
        ));
    }

    #[test]
    fn failed_inspection_restarts_from_manageable() {
        let planner = Planner::default();
        let mut run = run_for(A::Inspect);
        run.record_issued(A::Inspect, true);

        assert_eq!(issued(planner.next(&mut run, S::InspectFailed)), A::Manage);
        assert!(!run.operation_started);
        assert_eq!(issued(planner.next(&mut run, S::Manageable)), A::Inspect);
    }

    #[test]
    fn holds_are_released() {
        let planner = Planner::default();
        let mut run = run_for(A::Active);
        assert_eq!(issued(planner.next(&mut run, S::DeployHold)), A::Unhold);
        let mut run = run_for(A::Provide);
        assert_eq!(issued(planner.next(&mut run, S::CleanHold)), A::Unhold);
    }

    #[test]
    fn service_failure_aborts_back_to_active() {
        let planner = Planner::default();
        let mut run = run_for(A::Service).with_steps(false, true);
        assert_eq!(issued(planner.next(&mut run, S::Active)), A::Service);
        run.record_issued(A::Service, true);
        assert_eq!(issued(planner.next(&mut run, S::ServiceFailed)), A::Abort);
        assert!(!run.operation_started);
    }

    #[test]
    fn rescue_and_service_rows_pick_the_expected_action() {
        let planner = Planner::default();
        // (goal, state, action, is a recovery)
        let cases = [
            (A::Active, S::Rescue, A::Unrescue, false),
            (A::Deleted, S::Rescue, A::Deleted, false),
            (A::Active, S::RescueFailed, A::Unrescue, true),
            (A::Deleted, S::RescueFailed, A::Deleted, true),
            (A::Active, S::UnrescueFailed, A::Unrescue, true),
            (A::Deleted, S::UnrescueFailed, A::Deleted, true),
            (A::Active, S::ServiceFailed, A::Abort, true),
            (A::Deleted, S::ServiceFailed, A::Abort, true),
            (A::Service, S::ServiceFailed, A::Abort, true),
        ];
        for (goal, state, action, recovery) in cases {
            let mut run = run_for(goal);
            assert_eq!(
                planner.next(&mut run, state),
                Step::Issue(PlannedAction {
                    action,
                    recovery,
                    starts_operation: false,
                }),
                "{goal} at {state}"
            );
            assert_eq!(run.recoveries_used, u32::from(recovery), "{goal} at {state}");
        }
    }

    #[test]
    fn rescue_failures_have_no_route_to_other_goals() {
        let planner = Planner::default();
        for state in [S::RescueFailed, S::UnrescueFailed] {
            let mut run = run_for(A::Provide);
            assert_eq!(
                planner.next(&mut run, state),
                Step::Fatal(PlanError::NoValidTransition {
                    state,
                    goal: A::Provide
                })
            );
            assert_eq!(run.recovery_budget, 3);
        }
    }

    #[test]
    fn unsupported_goal_is_fatal() {
        let planner = Planner::default();
        let mut run = run_for(A::Rebuild);
        assert_eq!(
            planner.next(&mut run, S::Active),
            Step::Fatal(PlanError::UnsupportedTarget(A::Rebuild))
        );
    }

    #[test]
    fn illegal_candidate_is_never_issued() {
        // Without enroll --manage--> the planner must refuse rather than guess.
        let planner = Planner::new(TransitionTable::from_transitions(Vec::new()));
        let mut run = run_for(A::Active);
        assert!(matches!(
            planner.next(&mut run, S::Enroll),
            Step::Fatal(PlanError::NoValidTransition { .. })
        ));
    }

    #[test]
    fn every_issued_action_is_legal() {
        let planner = Planner::default();
        for goal in SUPPORTED_GOALS {
            for state in ProvisionState::ALL {
                for started in [false, true] {
                    for with_steps in [false, true] {
                        let mut run = run_for(goal).with_steps(with_steps, with_steps);
                        run.operation_started = started;
                        if let Step::Issue(planned) = planner.next(&mut run, state) {
                            assert!(
                                planner.table().is_legal_transition(state, planned.action),
                                "{goal}: planned illegal {state} --{}-->",
                                planned.action
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn never_issues_from_transient_states() {
        let planner = Planner::default();
        for goal in SUPPORTED_GOALS {
            for state in ProvisionState::ALL.into_iter().filter(|s| s.is_transient()) {
                let mut run = run_for(goal);
                let step = planner.next(&mut run, state);
                assert!(
                    matches!(step, Step::Wait | Step::Done),
                    "{goal} at {state}: {step:?}"
                );
            }
        }
    }
}
