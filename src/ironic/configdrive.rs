//! Client-side config drive images for Ironic APIs older than 1.56.
//!
//! Those servers only accept a finished image: an ISO9660 volume labelled
//! `config-2` holding `openstack/latest/{meta_data.json,network_data.json,user_data}`,
//! gzipped and base64-encoded. The ISO itself is produced by an external
//! mastering tool (`mkisofs` or `genisoimage`).

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::debug;

use super::error::ClientError;

const VOLUME_LABEL: &str = "config-2";
const PUBLISHER: &str = "ironwright";

/// Builds config drive images with an ISO mastering program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoBuilder {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl Default for IsoBuilder {
    fn default() -> Self {
        Self::new("mkisofs")
    }
}

impl IsoBuilder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Argument placed before the mastering options, e.g. a script path when
    /// `program` is an interpreter.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Build the image and return it gzipped and base64-encoded.
    ///
    /// Missing metadata is written as an empty JSON object; missing user
    /// data leaves the file out.
    pub async fn build(
        &self,
        user_data: Option<&str>,
        network_data: Option<&Map<String, Value>>,
        meta_data: Option<&Map<String, Value>>,
    ) -> Result<String, ClientError> {
        let workdir = tempfile::tempdir().map_err(build_err("create work directory"))?;
        let tree = workdir.path().join("tree");
        let latest = tree.join("openstack").join("latest");
        tokio::fs::create_dir_all(&latest)
            .await
            .map_err(build_err("create openstack/latest"))?;

        let empty = Map::new();
        for (name, data) in [
            ("meta_data.json", meta_data.unwrap_or(&empty)),
            ("network_data.json", network_data.unwrap_or(&empty)),
        ] {
            let json = serde_json::to_vec(data)
                .map_err(|e| ClientError::ConfigDriveBuild(format!("{name}: {e}")))?;
            tokio::fs::write(latest.join(name), json)
                .await
                .map_err(build_err(name))?;
        }
        if let Some(user_data) = user_data {
            tokio::fs::write(latest.join("user_data"), user_data)
                .await
                .map_err(build_err("user_data"))?;
        }

        let iso = workdir.path().join("configdrive.iso");
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .arg("-o")
            .arg(&iso)
            .args(["-ldots", "-allow-lowercase", "-allow-multidot", "-l"])
            .args(["-publisher", PUBLISHER, "-quiet", "-J", "-r", "-V", VOLUME_LABEL])
            .arg(&tree)
            .output()
            .await
            .map_err(|e| {
                ClientError::ConfigDriveBuild(format!(
                    "failed to run {}: {e}",
                    self.program.display()
                ))
            })?;
        if !output.status.success() {
            return Err(ClientError::ConfigDriveBuild(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let image = tokio::fs::read(&iso)
            .await
            .map_err(build_err("read built image"))?;
        debug!(bytes = image.len(), "built config drive image");
        encode(&image)
    }
}

fn encode(image: &[u8]) -> Result<String, ClientError> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(image).map_err(build_err("compress image"))?;
    let compressed = gz.finish().map_err(build_err("compress image"))?;
    Ok(STANDARD.encode(compressed))
}

fn build_err(what: &str) -> impl Fn(std::io::Error) -> ClientError + '_ {
    move |e| ClientError::ConfigDriveBuild(format!("{what}: {e}"))
}
