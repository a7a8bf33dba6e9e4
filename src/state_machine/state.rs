use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a node currently sits in Ironic's provisioning lifecycle.
///
/// The serialized form is the exact string Ironic reports in the node's
/// `provision_state` field (note the embedded spaces, e.g. `"deploy failed"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisionState {
    #[serde(rename = "enroll")]
    Enroll,
    #[serde(rename = "verifying")]
    Verifying,
    #[serde(rename = "manageable")]
    Manageable,
    #[serde(rename = "inspecting")]
    Inspecting,
    #[serde(rename = "inspect wait")]
    InspectWait,
    #[serde(rename = "inspect failed")]
    InspectFailed,
    #[serde(rename = "cleaning")]
    Cleaning,
    #[serde(rename = "clean wait")]
    CleanWait,
    #[serde(rename = "clean hold")]
    CleanHold,
    #[serde(rename = "clean failed")]
    CleanFailed,
    #[serde(rename = "available")]
    Available,
    #[serde(rename = "deploying")]
    Deploying,
    #[serde(rename = "wait call-back")]
    DeployWait,
    #[serde(rename = "deploy hold")]
    DeployHold,
    #[serde(rename = "deploy failed")]
    DeployFailed,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "deleting")]
    Deleting,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "rescuing")]
    Rescuing,
    #[serde(rename = "rescue wait")]
    RescueWait,
    #[serde(rename = "rescue")]
    Rescue,
    #[serde(rename = "rescue failed")]
    RescueFailed,
    #[serde(rename = "unrescuing")]
    Unrescuing,
    #[serde(rename = "unrescue failed")]
    UnrescueFailed,
    #[serde(rename = "adopting")]
    Adopting,
    #[serde(rename = "adopt failed")]
    AdoptFailed,
    #[serde(rename = "servicing")]
    Servicing,
    #[serde(rename = "service wait")]
    ServiceWait,
    #[serde(rename = "service hold")]
    ServiceHold,
    #[serde(rename = "service failed")]
    ServiceFailed,
}

impl ProvisionState {
    /// Every state Ironic can report.
    pub const ALL: [ProvisionState; 30] = [
        ProvisionState::Enroll,
        ProvisionState::Verifying,
        ProvisionState::Manageable,
        ProvisionState::Inspecting,
        ProvisionState::InspectWait,
        ProvisionState::InspectFailed,
        ProvisionState::Cleaning,
        ProvisionState::CleanWait,
        ProvisionState::CleanHold,
        ProvisionState::CleanFailed,
        ProvisionState::Available,
        ProvisionState::Deploying,
        ProvisionState::DeployWait,
        ProvisionState::DeployHold,
        ProvisionState::DeployFailed,
        ProvisionState::Active,
        ProvisionState::Deleting,
        ProvisionState::Error,
        ProvisionState::Rescuing,
        ProvisionState::RescueWait,
        ProvisionState::Rescue,
        ProvisionState::RescueFailed,
        ProvisionState::Unrescuing,
        ProvisionState::UnrescueFailed,
        ProvisionState::Adopting,
        ProvisionState::AdoptFailed,
        ProvisionState::Servicing,
        ProvisionState::ServiceWait,
        ProvisionState::ServiceHold,
        ProvisionState::ServiceFailed,
    ];

    /// The wire string Ironic uses for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionState::Enroll => "enroll",
            ProvisionState::Verifying => "verifying",
            ProvisionState::Manageable => "manageable",
            ProvisionState::Inspecting => "inspecting",
            ProvisionState::InspectWait => "inspect wait",
            ProvisionState::InspectFailed => "inspect failed",
            ProvisionState::Cleaning => "cleaning",
            ProvisionState::CleanWait => "clean wait",
            ProvisionState::CleanHold => "clean hold",
            ProvisionState::CleanFailed => "clean failed",
            ProvisionState::Available => "available",
            ProvisionState::Deploying => "deploying",
            ProvisionState::DeployWait => "wait call-back",
            ProvisionState::DeployHold => "deploy hold",
            ProvisionState::DeployFailed => "deploy failed",
            ProvisionState::Active => "active",
            ProvisionState::Deleting => "deleting",
            ProvisionState::Error => "error",
            ProvisionState::Rescuing => "rescuing",
            ProvisionState::RescueWait => "rescue wait",
            ProvisionState::Rescue => "rescue",
            ProvisionState::RescueFailed => "rescue failed",
            ProvisionState::Unrescuing => "unrescuing",
            ProvisionState::UnrescueFailed => "unrescue failed",
            ProvisionState::Adopting => "adopting",
            ProvisionState::AdoptFailed => "adopt failed",
            ProvisionState::Servicing => "servicing",
            ProvisionState::ServiceWait => "service wait",
            ProvisionState::ServiceHold => "service hold",
            ProvisionState::ServiceFailed => "service failed",
        }
    }

    /// States Ironic never leaves on its own. Only an explicit recovery
    /// action moves a node out of one of these.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            ProvisionState::DeployFailed
                | ProvisionState::CleanFailed
                | ProvisionState::InspectFailed
                | ProvisionState::RescueFailed
                | ProvisionState::UnrescueFailed
                | ProvisionState::ServiceFailed
                | ProvisionState::AdoptFailed
                | ProvisionState::Error
        )
    }

    /// States Ironic moves out of without a new client action. While a node
    /// sits in one of these the only thing to do is poll.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProvisionState::Verifying
                | ProvisionState::Inspecting
                | ProvisionState::InspectWait
                | ProvisionState::Cleaning
                | ProvisionState::CleanWait
                | ProvisionState::Deploying
                | ProvisionState::DeployWait
                | ProvisionState::Deleting
                | ProvisionState::Rescuing
                | ProvisionState::RescueWait
                | ProvisionState::Unrescuing
                | ProvisionState::Adopting
                | ProvisionState::Servicing
                | ProvisionState::ServiceWait
        )
    }

    /// Paused steps waiting for an operator `unhold`.
    pub fn is_hold(&self) -> bool {
        matches!(
            self,
            ProvisionState::CleanHold | ProvisionState::DeployHold | ProvisionState::ServiceHold
        )
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of Ironic's known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue(pub String);

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownValue {}

impl FromStr for ProvisionState {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProvisionState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownValue(s.to_string()))
    }
}

/// A command a client issues to request a state change (Ironic's "target").
///
/// Actions name intent; [`ProvisionState`] names position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionAction {
    Manage,
    Provide,
    Active,
    Deleted,
    Clean,
    Inspect,
    Rescue,
    Unrescue,
    Adopt,
    Abort,
    Rebuild,
    Service,
    Unhold,
}

impl TransitionAction {
    pub const ALL: [TransitionAction; 13] = [
        TransitionAction::Manage,
        TransitionAction::Provide,
        TransitionAction::Active,
        TransitionAction::Deleted,
        TransitionAction::Clean,
        TransitionAction::Inspect,
        TransitionAction::Rescue,
        TransitionAction::Unrescue,
        TransitionAction::Adopt,
        TransitionAction::Abort,
        TransitionAction::Rebuild,
        TransitionAction::Service,
        TransitionAction::Unhold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionAction::Manage => "manage",
            TransitionAction::Provide => "provide",
            TransitionAction::Active => "active",
            TransitionAction::Deleted => "deleted",
            TransitionAction::Clean => "clean",
            TransitionAction::Inspect => "inspect",
            TransitionAction::Rescue => "rescue",
            TransitionAction::Unrescue => "unrescue",
            TransitionAction::Adopt => "adopt",
            TransitionAction::Abort => "abort",
            TransitionAction::Rebuild => "rebuild",
            TransitionAction::Service => "service",
            TransitionAction::Unhold => "unhold",
        }
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionAction {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransitionAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownValue(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_failure_states() {
        let cases = [
            (ProvisionState::InspectFailed, true),
            (ProvisionState::CleanFailed, true),
            (ProvisionState::DeployFailed, true),
            (ProvisionState::Error, true),
            (ProvisionState::RescueFailed, true),
            (ProvisionState::UnrescueFailed, true),
            (ProvisionState::AdoptFailed, true),
            (ProvisionState::ServiceFailed, true),
            (ProvisionState::Active, false),
            (ProvisionState::Available, false),
            (ProvisionState::Manageable, false),
        ];
        for (state, expected) in cases {
            assert_eq!(state.is_terminal_failure(), expected, "{state}");
        }
    }

    #[test]
    fn transient_states() {
        let cases = [
            (ProvisionState::Verifying, true),
            (ProvisionState::Inspecting, true),
            (ProvisionState::InspectWait, true),
            (ProvisionState::Cleaning, true),
            (ProvisionState::CleanWait, true),
            (ProvisionState::Deploying, true),
            (ProvisionState::DeployWait, true),
            (ProvisionState::Deleting, true),
            (ProvisionState::Rescuing, true),
            (ProvisionState::RescueWait, true),
            (ProvisionState::Unrescuing, true),
            (ProvisionState::Adopting, true),
            (ProvisionState::Servicing, true),
            (ProvisionState::ServiceWait, true),
            (ProvisionState::Active, false),
            (ProvisionState::Available, false),
            (ProvisionState::Manageable, false),
            (ProvisionState::Error, false),
            (ProvisionState::CleanHold, false),
        ];
        for (state, expected) in cases {
            assert_eq!(state.is_transient(), expected, "{state}");
        }
    }

    #[test]
    fn transient_and_terminal_are_disjoint() {
        for state in ProvisionState::ALL {
            assert!(
                !(state.is_transient() && state.is_terminal_failure()),
                "{state} is both transient and a terminal failure"
            );
            if state.is_hold() {
                assert!(!state.is_transient() && !state.is_terminal_failure());
            }
        }
    }

    #[test]
    fn parses_every_wire_string() {
        let wire = [
            "enroll", "verifying", "manageable",
            "inspecting", "inspect wait", "inspect failed",
            "cleaning", "clean failed", "clean wait", "clean hold",
            "available",
            "active", "deploying", "wait call-back", "deploy failed", "deploy hold",
            "deleting", "error",
            "rescuing", "rescue wait", "rescue", "rescue failed",
            "unrescuing", "unrescue failed",
            "adopting", "adopt failed",
            "servicing", "service wait", "service failed", "service hold",
        ];
        for s in wire {
            let state: ProvisionState = s.parse().unwrap();
            assert_eq!(state.to_string(), s);
        }
        assert_eq!(wire.len(), ProvisionState::ALL.len());
    }

    #[test]
    fn rejects_unknown_states() {
        for s in ["invalid", "unknown", "not-a-state", "rebuild", "Active"] {
            let err = s.parse::<ProvisionState>().unwrap_err();
            assert_eq!(err, UnknownValue(s.to_string()));
        }
    }

    #[test]
    fn serde_uses_wire_strings() {
        let json = serde_json::to_string(&ProvisionState::DeployWait).unwrap();
        assert_eq!(json, r#""wait call-back""#);
        let state: ProvisionState = serde_json::from_str(r#""deploy failed""#).unwrap();
        assert_eq!(state, ProvisionState::DeployFailed);

        let json = serde_json::to_string(&TransitionAction::Deleted).unwrap();
        assert_eq!(json, r#""deleted""#);
    }

    #[test]
    fn action_display_matches_from_str() {
        for action in TransitionAction::ALL {
            assert_eq!(action.to_string().parse::<TransitionAction>().unwrap(), action);
        }
        assert!("undeploy".parse::<TransitionAction>().is_err());
    }
}
