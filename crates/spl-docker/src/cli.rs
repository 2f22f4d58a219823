//! [`DockerApi`] over the `docker` command-line client
//!
//! Listing commands use `--format '{{json .}}'`, one JSON object per line.
//! Archives go through `docker cp` with `-` as tar stream on stdin/stdout.

use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::api::{ContainerInfo, ContainerSpec, DockerApi, ImageInfo, VolumeInfo};
use crate::{DockerError, Result};

/// Docker engine reached through the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    host: Option<String>,
}

impl DockerCli {
    /// Client for the engine at `socket` (e.g. `unix:///var/run/docker.sock`).
    ///
    /// An empty socket uses the docker CLI default context.
    pub fn new(socket: &str) -> Self {
        Self {
            binary: "docker".to_string(),
            host: (!socket.is_empty()).then(|| socket.to_string()),
        }
    }

    /// Use another docker-compatible binary (e.g. `podman`).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(host) = &self.host {
            cmd.arg("--host").arg(host);
        }
        cmd.args(args);
        cmd
    }

    fn run_bytes(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>> {
        debug!(?args, "docker");
        let mut cmd = self.command(args);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }

        let mut child = cmd.spawn()?;
        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input)?;
        }
        let output = child.wait_with_output()?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(DockerError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let stdout = self.run_bytes(args, None)?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }
}

#[derive(Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status", default)]
    status: String,
}

#[derive(Deserialize)]
struct ImageLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Repository")]
    repository: String,
    #[serde(rename = "Tag")]
    tag: String,
}

#[derive(Deserialize)]
struct VolumeLine {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Labels", default)]
    labels: String,
}

fn json_lines<T: for<'de> Deserialize<'de>>(command: &str, output: &str) -> Result<Vec<T>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| DockerError::Decode {
                command: command.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

pub(crate) fn parse_containers(output: &str) -> Result<Vec<ContainerInfo>> {
    Ok(json_lines::<PsLine>("ps", output)?
        .into_iter()
        .map(|line| ContainerInfo {
            id: line.id,
            names: line.names.split(',').map(str::to_string).collect(),
            image: line.image,
            state: line.state,
            status: line.status,
        })
        .collect())
}

pub(crate) fn parse_images(output: &str) -> Result<Vec<ImageInfo>> {
    Ok(json_lines::<ImageLine>("images", output)?
        .into_iter()
        .map(|line| ImageInfo {
            id: line.id,
            repo_tags: if line.repository == "<none>" || line.tag == "<none>" {
                Vec::new()
            } else {
                vec![format!("{}:{}", line.repository, line.tag)]
            },
        })
        .collect())
}

pub(crate) fn parse_volumes(output: &str) -> Result<Vec<VolumeInfo>> {
    Ok(json_lines::<VolumeLine>("volume ls", output)?
        .into_iter()
        .map(|line| VolumeInfo {
            name: line.name,
            labels: line
                .labels
                .split(',')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
        .collect())
}

/// `docker create` arguments for a spec, image last.
pub(crate) fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--hostname".to_string(),
        spec.hostname.clone(),
    ];
    for env in &spec.environment {
        args.push("--env".to_string());
        args.push(env.clone());
    }
    for mount in &spec.mounts {
        args.push("--mount".to_string());
        args.push(format!(
            "type=volume,source={},target={}",
            mount.source, mount.target
        ));
    }
    for bind in &spec.binds {
        args.push("--volume".to_string());
        args.push(format!("{}:{}:{}", bind.host, bind.container, bind.mode));
    }
    for (host, container) in &spec.ports {
        args.push("--publish".to_string());
        args.push(format!("{host}:{container}"));
    }
    if let Some(user) = &spec.user {
        args.push("--user".to_string());
        args.push(user.clone());
    }
    args.push(spec.image.clone());
    args
}

impl DockerApi for DockerCli {
    fn images(&self) -> Result<Vec<ImageInfo>> {
        parse_images(&self.run(&["images", "--no-trunc", "--format", "{{json .}}"])?)
    }

    fn pull(&self, image: &str) -> Result<ImageInfo> {
        self.run(&["pull", image])?;
        self.images()?
            .into_iter()
            .find(|i| i.repo_tags.iter().any(|t| t == image))
            .ok_or_else(|| DockerError::NotFound(image.to_string()))
    }

    fn containers(&self, all: bool) -> Result<Vec<ContainerInfo>> {
        let mut args = vec!["ps", "--no-trunc", "--format", "{{json .}}"];
        if all {
            args.push("--all");
        }
        parse_containers(&self.run(&args)?)
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let args = create_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Ok(self.run(&args)?.trim().to_string())
    }

    fn start(&self, container: &str) -> Result<()> {
        self.run(&["start", container]).map(|_| ())
    }

    fn restart(&self, container: &str) -> Result<()> {
        self.run(&["restart", container]).map(|_| ())
    }

    fn stop(&self, container: &str) -> Result<()> {
        self.run(&["stop", container]).map(|_| ())
    }

    fn remove(&self, container: &str) -> Result<()> {
        self.run(&["rm", "--force", container]).map(|_| ())
    }

    fn logs(&self, container: &str) -> Result<String> {
        let output = self.command(&["logs", container]).output()?;
        Ok(format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ))
    }

    fn exec(&self, container: &str, workdir: &str, cmd: &[String]) -> Result<String> {
        let mut args = vec!["exec", "--workdir", workdir, container];
        args.extend(cmd.iter().map(String::as_str));
        self.run(&args)
    }

    fn put_archive(&self, container: &str, path: &str, tar: &[u8]) -> Result<()> {
        let target = format!("{container}:{path}");
        self.run_bytes(&["cp", "-", &target], Some(tar)).map(|_| ())
    }

    fn get_archive(&self, container: &str, path: &str) -> Result<Vec<u8>> {
        let source = format!("{container}:{path}");
        self.run_bytes(&["cp", &source, "-"], None)
    }

    fn volumes(&self) -> Result<Vec<VolumeInfo>> {
        parse_volumes(&self.run(&["volume", "ls", "--format", "{{json .}}"])?)
    }

    fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<VolumeInfo> {
        let label_args: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut args = vec!["volume", "create", "--driver", "local"];
        for label in &label_args {
            args.push("--label");
            args.push(label);
        }
        args.push(name);
        self.run(&args)?;
        Ok(VolumeInfo {
            name: name.to_string(),
            labels: labels.clone(),
        })
    }
}
