//! Docker engine access for the Splunk management utility
//!
//! [`DockerApi`] is the seam the container and packaging managers use;
//! [`DockerCli`] implements it by driving the `docker` binary.

pub mod api;
pub mod cli;
pub mod error;

pub use api::{Bind, ContainerInfo, ContainerSpec, DockerApi, ImageInfo, VolumeInfo, VolumeMount};
pub use cli::DockerCli;
pub use error::{DockerError, Result};
