use serde::{Deserialize, Serialize};

use super::state::{ProvisionState, TransitionAction};

/// One legal client-issued hop in Ironic's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ProvisionState,
    pub action: TransitionAction,
    pub to: ProvisionState,
}

impl StateTransition {
    pub const fn new(from: ProvisionState, action: TransitionAction, to: ProvisionState) -> Self {
        Self { from, action, to }
    }
}

/// The authoritative map of what the remote service allows.
///
/// Only client-issued actions are recorded. Ironic's internal events
/// (`done`, `fail`, `wait`, `resume`) are not something a client can request,
/// so transient states have no entries of their own apart from `abort`.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    transitions: Vec<StateTransition>,
}

impl TransitionTable {
    /// Table mirroring Ironic's documented provisioning state machine.
    pub fn ironic() -> Self {
        Self::from_transitions(IRONIC_TRANSITIONS.to_vec())
    }

    /// Build a table from an arbitrary list, e.g. a partial table in tests.
    pub fn from_transitions(transitions: Vec<StateTransition>) -> Self {
        Self { transitions }
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// All transitions leaving `state`. Empty when none are defined.
    pub fn valid_transitions_from(&self, state: ProvisionState) -> Vec<StateTransition> {
        self.transitions
            .iter()
            .filter(|t| t.from == state)
            .copied()
            .collect()
    }

    pub fn is_legal_transition(&self, state: ProvisionState, action: TransitionAction) -> bool {
        self.expected_result_state(state, action).is_some()
    }

    /// The state Ironic moves the node into when `action` is accepted in `state`.
    pub fn expected_result_state(
        &self,
        state: ProvisionState,
        action: TransitionAction,
    ) -> Option<ProvisionState> {
        self.transitions
            .iter()
            .find(|t| t.from == state && t.action == action)
            .map(|t| t.to)
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::ironic()
    }
}

use ProvisionState as S;
use TransitionAction as A;

const IRONIC_TRANSITIONS: &[StateTransition] = &[
    // Enrollment and verification
    StateTransition::new(S::Enroll, A::Manage, S::Verifying),
    // Manageable
    StateTransition::new(S::Manageable, A::Provide, S::Cleaning),
    StateTransition::new(S::Manageable, A::Clean, S::Cleaning),
    StateTransition::new(S::Manageable, A::Inspect, S::Inspecting),
    StateTransition::new(S::Manageable, A::Adopt, S::Adopting),
    // Available
    StateTransition::new(S::Available, A::Manage, S::Manageable),
    StateTransition::new(S::Available, A::Active, S::Deploying),
    // Active
    StateTransition::new(S::Active, A::Rebuild, S::Deploying),
    StateTransition::new(S::Active, A::Deleted, S::Deleting),
    StateTransition::new(S::Active, A::Rescue, S::Rescuing),
    StateTransition::new(S::Active, A::Service, S::Servicing),
    // Deployment
    StateTransition::new(S::DeployFailed, A::Active, S::Deploying),
    StateTransition::new(S::DeployFailed, A::Rebuild, S::Deploying),
    StateTransition::new(S::DeployFailed, A::Deleted, S::Deleting),
    StateTransition::new(S::DeployWait, A::Deleted, S::Deleting),
    StateTransition::new(S::DeployWait, A::Abort, S::DeployFailed),
    StateTransition::new(S::DeployHold, A::Unhold, S::DeployWait),
    StateTransition::new(S::DeployHold, A::Abort, S::DeployFailed),
    // Tear down failures
    StateTransition::new(S::Error, A::Rebuild, S::Deploying),
    StateTransition::new(S::Error, A::Deleted, S::Deleting),
    // Cleaning
    StateTransition::new(S::CleanWait, A::Abort, S::CleanFailed),
    StateTransition::new(S::CleanHold, A::Unhold, S::CleanWait),
    StateTransition::new(S::CleanHold, A::Abort, S::CleanFailed),
    StateTransition::new(S::CleanFailed, A::Manage, S::Manageable),
    // Inspection
    StateTransition::new(S::InspectWait, A::Abort, S::InspectFailed),
    StateTransition::new(S::InspectFailed, A::Manage, S::Manageable),
    StateTransition::new(S::InspectFailed, A::Inspect, S::Inspecting),
    // Adoption
    StateTransition::new(S::AdoptFailed, A::Manage, S::Manageable),
    StateTransition::new(S::AdoptFailed, A::Adopt, S::Adopting),
    // Rescue
    StateTransition::new(S::RescueWait, A::Abort, S::RescueFailed),
    StateTransition::new(S::Rescue, A::Rescue, S::Rescuing),
    StateTransition::new(S::Rescue, A::Unrescue, S::Unrescuing),
    StateTransition::new(S::Rescue, A::Deleted, S::Deleting),
    StateTransition::new(S::RescueFailed, A::Rescue, S::Rescuing),
    StateTransition::new(S::RescueFailed, A::Unrescue, S::Unrescuing),
    StateTransition::new(S::RescueFailed, A::Deleted, S::Deleting),
    StateTransition::new(S::UnrescueFailed, A::Rescue, S::Rescuing),
    StateTransition::new(S::UnrescueFailed, A::Unrescue, S::Unrescuing),
    StateTransition::new(S::UnrescueFailed, A::Deleted, S::Deleting),
    // Servicing
    StateTransition::new(S::ServiceWait, A::Abort, S::ServiceFailed),
    StateTransition::new(S::ServiceHold, A::Unhold, S::ServiceWait),
    StateTransition::new(S::ServiceHold, A::Abort, S::ServiceFailed),
    StateTransition::new(S::ServiceFailed, A::Service, S::Servicing),
    StateTransition::new(S::ServiceFailed, A::Rescue, S::Rescuing),
    StateTransition::new(S::ServiceFailed, A::Abort, S::Active),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stable_state_has_an_exit() {
        let table = TransitionTable::ironic();
        for state in ProvisionState::ALL {
            if state.is_transient() {
                continue;
            }
            assert!(
                !table.valid_transitions_from(state).is_empty(),
                "no transitions defined from '{state}'"
            );
        }
    }

    #[test]
    fn every_terminal_failure_has_a_recovery() {
        let table = TransitionTable::ironic();
        for state in ProvisionState::ALL.into_iter().filter(|s| s.is_terminal_failure()) {
            let exits = table.valid_transitions_from(state);
            assert!(
                exits.iter().any(|t| !t.to.is_terminal_failure()),
                "'{state}' has no way out of failure"
            );
        }
    }

    #[test]
    fn legal_transitions() {
        let table = TransitionTable::ironic();
        let cases = [
            (S::Enroll, A::Manage, true),
            (S::Active, A::Service, true),
            (S::Available, A::Manage, true),
            (S::Error, A::Deleted, true),
            (S::RescueFailed, A::Rescue, true),
            (S::ServiceFailed, A::Service, true),
            (S::ServiceFailed, A::Rescue, true),
            (S::DeployHold, A::Unhold, true),
            (S::Active, A::Inspect, false),
            (S::Enroll, A::Active, false),
            (S::Manageable, A::Manage, false),
            (S::Deploying, A::Deleted, false),
        ];
        for (from, action, expected) in cases {
            assert_eq!(
                table.is_legal_transition(from, action),
                expected,
                "{from} --{action}-->"
            );
        }
    }

    #[test]
    fn expected_result_states() {
        let table = TransitionTable::ironic();
        assert_eq!(table.expected_result_state(S::Enroll, A::Manage), Some(S::Verifying));
        assert_eq!(table.expected_result_state(S::Active, A::Service), Some(S::Servicing));
        assert_eq!(table.expected_result_state(S::Error, A::Deleted), Some(S::Deleting));
        assert_eq!(table.expected_result_state(S::Available, A::Active), Some(S::Deploying));
        assert_eq!(table.expected_result_state(S::Active, A::Inspect), None);
    }

    #[test]
    fn transient_states_only_accept_abort_or_teardown() {
        let table = TransitionTable::ironic();
        for state in ProvisionState::ALL.into_iter().filter(|s| s.is_transient()) {
            for t in table.valid_transitions_from(state) {
                assert!(
                    matches!(t.action, A::Abort | A::Deleted),
                    "unexpected client action {} from transient '{state}'",
                    t.action
                );
            }
        }
    }

    #[test]
    fn no_duplicate_entries() {
        let table = TransitionTable::ironic();
        let all = table.transitions();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!(
                    !(a.from == b.from && a.action == b.action),
                    "duplicate entry for {} --{}-->",
                    a.from,
                    a.action
                );
            }
        }
    }

    #[test]
    fn partial_table_is_honored() {
        let table = TransitionTable::from_transitions(vec![StateTransition::new(
            S::Available,
            A::Active,
            S::Deploying,
        )]);
        assert!(table.is_legal_transition(S::Available, A::Active));
        assert!(!table.is_legal_transition(S::Enroll, A::Manage));
        assert!(table.valid_transitions_from(S::Enroll).is_empty());
    }
}
