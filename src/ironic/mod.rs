pub mod adapter;
pub mod client;
pub mod configdrive;
pub mod error;
pub mod types;

pub use adapter::{BusyRetry, NodeAdapter};
pub use client::{Auth, IronicClient, ProvisionApi};
pub use configdrive::IsoBuilder;
pub use error::ClientError;
pub use types::{
    ConfigDrive, ConfigDriveSpec, Microversion, Node, NodeStatus, ProvisionPayload,
    ProvisionStateRequest, Step, StepInterface, UserData,
};
