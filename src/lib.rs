pub mod cli;
pub mod config;
pub mod error;
pub mod ironic;
pub mod payload;
pub mod state_machine;
pub mod telemetry;
pub mod ui;
pub mod workflow;
