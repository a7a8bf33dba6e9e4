mod planner;
mod run;
mod state;
mod table;

pub use planner::{PlanError, PlannedAction, Planner, SUPPORTED_GOALS, Step, is_supported_goal};
pub use run::{WorkflowReport, WorkflowRun};
pub use state::{ProvisionState, TransitionAction, UnknownValue};
pub use table::{StateTransition, TransitionTable};
