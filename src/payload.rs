//! Provisioning payload files.
//!
//! A payload file carries the optional data attached to provisioning
//! requests: a config drive, deploy steps, and manual clean or service steps.
//! The format is picked from the file extension (`.json` or `.toml`).

use std::path::Path;

use serde::Deserialize;

use crate::error::IronwrightError;
use crate::ironic::{ConfigDrive, ConfigDriveSpec, IsoBuilder, Microversion, ProvisionPayload, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Toml,
}

impl PayloadFormat {
    pub fn from_path(path: &Path) -> Result<Self, IronwrightError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(PayloadFormat::Json),
            Some("toml") => Ok(PayloadFormat::Toml),
            _ => Err(IronwrightError::Payload(format!(
                "{}: expected a .json or .toml file",
                path.display()
            ))),
        }
    }
}

/// Payload as written by the user, before the config drive is negotiated
/// against the API version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadFile {
    #[serde(default)]
    pub config_drive: Option<ConfigDriveSpec>,
    #[serde(default)]
    pub deploy_steps: Option<Vec<Step>>,
    #[serde(default)]
    pub clean_steps: Option<Vec<Step>>,
    #[serde(default)]
    pub service_steps: Option<Vec<Step>>,
}

impl PayloadFile {
    pub fn load(path: &Path) -> Result<Self, IronwrightError> {
        let format = PayloadFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, format)
    }

    pub fn parse(contents: &str, format: PayloadFormat) -> Result<Self, IronwrightError> {
        Ok(match format {
            PayloadFormat::Json => serde_json::from_str(contents)?,
            PayloadFormat::Toml => toml::from_str(contents)?,
        })
    }

    /// Turn the file into request data for `version`, building a config
    /// drive image with `iso` when the server is too old to build its own.
    pub async fn resolve(
        self,
        version: Microversion,
        iso: &IsoBuilder,
    ) -> Result<ProvisionPayload, IronwrightError> {
        for (kind, steps) in [
            ("deploy", &self.deploy_steps),
            ("clean", &self.clean_steps),
            ("service", &self.service_steps),
        ] {
            if let Some(step) = steps.iter().flatten().find(|s| s.step.trim().is_empty()) {
                return Err(IronwrightError::Payload(format!(
                    "{kind} step on interface '{:?}' has no name",
                    step.interface
                )));
            }
        }

        let config_drive = match self.config_drive {
            Some(spec) => Some(ConfigDrive::negotiate(spec, version, iso).await?),
            None => None,
        };

        Ok(ProvisionPayload {
            config_drive,
            deploy_steps: self.deploy_steps,
            clean_steps: self.clean_steps,
            service_steps: self.service_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ironic::{ClientError, StepInterface, UserData};
    use std::io::Write;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            PayloadFormat::from_path(Path::new("deploy.json")).unwrap(),
            PayloadFormat::Json
        );
        assert_eq!(
            PayloadFormat::from_path(Path::new("deploy.toml")).unwrap(),
            PayloadFormat::Toml
        );
        assert!(matches!(
            PayloadFormat::from_path(Path::new("deploy.yaml")),
            Err(IronwrightError::Payload(_))
        ));
    }

    #[test]
    fn parse_json_payload() {
        let file = PayloadFile::parse(
            r##"{
                "config_drive": {
                    "user_data": "#cloud-config\nhostname: n0\n",
                    "meta_data": {"uuid": "1be26c0b"}
                },
                "deploy_steps": [
                    {"interface": "deploy", "step": "install_coreos", "priority": 80}
                ]
            }"##,
            PayloadFormat::Json,
        )
        .unwrap();

        let spec = file.config_drive.as_ref().unwrap();
        assert!(matches!(spec.user_data, Some(UserData::Text(_))));
        assert_eq!(file.deploy_steps.as_ref().unwrap()[0].priority, Some(80));
        assert!(file.clean_steps.is_none());
    }

    #[test]
    fn parse_toml_payload() {
        let file = PayloadFile::parse(
            r#"
                [[clean_steps]]
                interface = "raid"
                step = "delete_configuration"

                [[clean_steps]]
                interface = "deploy"
                step = "erase_devices"
                args = { force = true }
            "#,
            PayloadFormat::Toml,
        )
        .unwrap();

        let steps = file.clean_steps.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].interface, StepInterface::Raid);
        assert_eq!(steps[1].args["force"], serde_json::json!(true));
    }

    fn no_iso_tool() -> IsoBuilder {
        IsoBuilder::new("/nonexistent/mkisofs")
    }

    #[tokio::test]
    async fn resolve_negotiates_config_drive() {
        let file = PayloadFile {
            config_drive: Some(ConfigDriveSpec {
                user_data: Some(UserData::Text("#!/bin/sh".into())),
                ..Default::default()
            }),
            ..Default::default()
        };

        let payload = file
            .clone()
            .resolve(Microversion::new(1, 99), &no_iso_tool())
            .await
            .unwrap();
        assert!(matches!(payload.config_drive, Some(ConfigDrive::Structured { .. })));

        let err = file
            .resolve(Microversion::new(1, 50), &no_iso_tool())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IronwrightError::Client(ClientError::ConfigDriveBuild(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_builds_image_for_old_api() {
        use crate::ironic::configdrive::tests::{FAKE_ISO_TOOL, decode, fake_tool};

        let bin = tempfile::tempdir().unwrap();
        let file = PayloadFile::parse(
            r#"
                [config_drive]
                user_data = "echo hi"
                meta_data = { uuid = "1be26c0b" }
            "#,
            PayloadFormat::Toml,
        )
        .unwrap();

        let payload = file
            .resolve(Microversion::new(1, 38), &fake_tool(bin.path(), FAKE_ISO_TOOL))
            .await
            .unwrap();

        let Some(ConfigDrive::Blob(blob)) = &payload.config_drive else {
            panic!("expected a built image, got {:?}", payload.config_drive);
        };
        let image = decode(blob);
        assert!(image.contains("echo hi"), "{image}");
        assert!(image.ends_with(r#"{"uuid":"1be26c0b"}"#), "{image}");
    }

    #[tokio::test]
    async fn resolve_rejects_unnamed_steps() {
        let file = PayloadFile::parse(
            r#"{"service_steps": [{"interface": "bios", "step": " "}]}"#,
            PayloadFormat::Json,
        )
        .unwrap();
        let err = file
            .resolve(Microversion::new(1, 99), &no_iso_tool())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("service step"));
    }

    #[tokio::test]
    async fn load_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"config_drive": {{"image": "https://images/cd.iso.gz"}}}}"#).unwrap();

        let payload = PayloadFile::load(file.path())
            .unwrap()
            .resolve(Microversion::new(1, 31), &no_iso_tool())
            .await
            .unwrap();
        assert_eq!(
            payload.config_drive,
            Some(ConfigDrive::Blob("https://images/cd.iso.gz".into()))
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "clean_steps = 3").unwrap();
        assert!(matches!(
            PayloadFile::load(file.path()),
            Err(IronwrightError::Toml(_))
        ));
    }
}
