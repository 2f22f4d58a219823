//! Engine-independent docker types and the [`DockerApi`] trait

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A local image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: String,
    /// `repository:tag` strings; untagged images have none
    pub repo_tags: Vec<String>,
}

/// A container as listed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    /// Container names without the leading slash
    pub names: Vec<String>,
    pub image: String,
    /// Machine state: `created`, `running`, `exited`, ...
    pub state: String,
    /// Human status: `Up 2 hours`, `Exited (0) 3 minutes ago`, `Created`
    pub status: String,
}

impl ContainerInfo {
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.trim_start_matches('/') == name)
    }

    pub fn is_up(&self) -> bool {
        self.status.starts_with("Up") || self.state == "running"
    }

    pub fn is_exited(&self) -> bool {
        self.status.starts_with("Exited") || self.state == "exited"
    }

    pub fn is_created(&self) -> bool {
        self.status == "Created" || self.state == "created"
    }
}

/// A named volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// Named volume mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub source: String,
    pub target: String,
}

/// Host directory bound into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    pub host: String,
    pub container: String,
    /// `rw` or `ro`
    pub mode: String,
}

/// Everything needed to create a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub hostname: String,
    pub image: String,
    /// `KEY=value` entries
    pub environment: Vec<String>,
    pub mounts: Vec<VolumeMount>,
    pub binds: Vec<Bind>,
    /// `(host, container)` port pairs
    pub ports: Vec<(u16, u16)>,
    pub user: Option<String>,
}

/// Operations the managers need from a docker engine.
pub trait DockerApi: Send + Sync {
    fn images(&self) -> Result<Vec<ImageInfo>>;

    /// Pull `image` (`repository:tag`) and return the local image.
    fn pull(&self, image: &str) -> Result<ImageInfo>;

    fn containers(&self, all: bool) -> Result<Vec<ContainerInfo>>;

    /// Create a container and return its id.
    fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    fn start(&self, container: &str) -> Result<()>;

    fn restart(&self, container: &str) -> Result<()>;

    fn stop(&self, container: &str) -> Result<()>;

    fn remove(&self, container: &str) -> Result<()>;

    /// Combined stdout/stderr of a container.
    fn logs(&self, container: &str) -> Result<String>;

    /// Run `cmd` inside a running container and return its stdout.
    fn exec(&self, container: &str, workdir: &str, cmd: &[String]) -> Result<String>;

    /// Extract a tar stream into `path` inside the container.
    fn put_archive(&self, container: &str, path: &str, tar: &[u8]) -> Result<()>;

    /// Tar stream of `path` inside the container.
    fn get_archive(&self, container: &str, path: &str) -> Result<Vec<u8>>;

    fn volumes(&self) -> Result<Vec<VolumeInfo>>;

    fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<VolumeInfo>;
}
