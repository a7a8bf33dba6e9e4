//! Wire types for the Ironic v1 node and provision-state endpoints.
//!
//! Field names follow Ironic's JSON schema (`provision_state`,
//! `configdrive`, `clean_steps`, ...). Everything that goes into a
//! provision-state request derives `Serialize`; everything read back from a
//! node derives `Deserialize`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::configdrive::IsoBuilder;
use super::error::ClientError;
use crate::state_machine::{ProvisionState, TransitionAction};

/// The subset of an Ironic node this client reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Raw state string; parsed by the adapter so unknown values surface as
    /// errors instead of deserialization failures.
    pub provision_state: String,
    #[serde(default)]
    pub target_provision_state: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// A node's state as seen by the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub state: ProvisionState,
    pub target: Option<String>,
    pub last_error: Option<String>,
}

impl TryFrom<Node> for NodeStatus {
    type Error = ClientError;

    fn try_from(node: Node) -> Result<Self, Self::Error> {
        let state = node
            .provision_state
            .parse::<ProvisionState>()
            .map_err(|e| ClientError::UnknownState(e.0))?;
        Ok(Self {
            state,
            target: node.target_provision_state,
            last_error: node.last_error.filter(|e| !e.is_empty()),
        })
    }
}

/// An Ironic API microversion such as `1.56`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Microversion {
    pub major: u32,
    pub minor: u32,
}

impl Microversion {
    /// First version that accepts a structured config drive and builds the
    /// ISO server-side.
    pub const STRUCTURED_CONFIG_DRIVE: Microversion = Microversion::new(1, 56);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl FromStr for Microversion {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ClientError::InvalidMicroversion(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for Microversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// User data is either an opaque string (cloud-init script) or a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserData {
    Text(String),
    Structured(Map<String, Value>),
}

/// Config drive as the caller describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDriveSpec {
    /// Pre-built gzipped, base64-encoded ISO image or a URL to one.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub user_data: Option<UserData>,
    #[serde(default)]
    pub network_data: Option<Map<String, Value>>,
    #[serde(default)]
    pub meta_data: Option<Map<String, Value>>,
}

/// Config drive as sent to Ironic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigDrive {
    Blob(String),
    Structured {
        #[serde(skip_serializing_if = "Option::is_none")]
        user_data: Option<UserData>,
        #[serde(skip_serializing_if = "Option::is_none")]
        network_data: Option<Map<String, Value>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        meta_data: Option<Map<String, Value>>,
    },
}

impl ConfigDrive {
    /// Decide the config drive form for the API version in use.
    ///
    /// A pre-built image is always passed through. From 1.56 the structured
    /// form is sent and Ironic builds the ISO. Older servers get an image
    /// built here with `iso`, which only takes text user data.
    pub async fn negotiate(
        spec: ConfigDriveSpec,
        version: Microversion,
        iso: &IsoBuilder,
    ) -> Result<Self, ClientError> {
        if let Some(image) = spec.image {
            return Ok(ConfigDrive::Blob(image));
        }
        if version >= Microversion::STRUCTURED_CONFIG_DRIVE {
            return Ok(ConfigDrive::Structured {
                user_data: spec.user_data,
                network_data: spec.network_data,
                meta_data: spec.meta_data,
            });
        }
        let user_data = match &spec.user_data {
            None => None,
            Some(UserData::Text(text)) => Some(text.as_str()),
            Some(UserData::Structured(_)) => {
                return Err(ClientError::ConfigDriveUnsupported {
                    version: version.to_string(),
                });
            }
        };
        let image = iso
            .build(user_data, spec.network_data.as_ref(), spec.meta_data.as_ref())
            .await?;
        Ok(ConfigDrive::Blob(image))
    }
}

/// Hardware interface a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepInterface {
    Bios,
    Deploy,
    Firmware,
    Management,
    Power,
    Raid,
    Rescue,
    Storage,
    Vendor,
}

/// A deploy, clean or service step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub interface: StepInterface,
    pub step: String,
    /// Required for deploy steps, ignored by Ironic for manual clean and
    /// service steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

/// Optional data a caller hands to the workflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionPayload {
    pub config_drive: Option<ConfigDrive>,
    pub deploy_steps: Option<Vec<Step>>,
    pub clean_steps: Option<Vec<Step>>,
    pub service_steps: Option<Vec<Step>>,
}

impl ProvisionPayload {
    pub fn has_clean_steps(&self) -> bool {
        self.clean_steps.as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_service_steps(&self) -> bool {
        self.service_steps.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// Body of `PUT /v1/nodes/{id}/states/provision`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionStateRequest {
    pub target: TransitionAction,
    #[serde(rename = "configdrive", skip_serializing_if = "Option::is_none")]
    pub config_drive: Option<ConfigDrive>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_steps: Option<Vec<Step>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_steps: Option<Vec<Step>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_steps: Option<Vec<Step>>,
}

impl ProvisionStateRequest {
    /// Build the request for `action`, attaching only the payload Ironic
    /// accepts for it.
    pub fn for_action(action: TransitionAction, payload: &ProvisionPayload) -> Self {
        let mut req = Self {
            target: action,
            config_drive: None,
            deploy_steps: None,
            clean_steps: None,
            service_steps: None,
        };
        match action {
            TransitionAction::Active => {
                req.config_drive = payload.config_drive.clone();
                req.deploy_steps = payload.deploy_steps.clone();
            }
            TransitionAction::Clean => {
                req.clean_steps = Some(payload.clean_steps.clone().unwrap_or_default());
            }
            TransitionAction::Service => {
                req.service_steps = Some(payload.service_steps.clone().unwrap_or_default());
            }
            _ => {}
        }
        req
    }
}
