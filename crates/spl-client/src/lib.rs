//! Splunk REST management API client
//!
//! Provides the transport behind a connection adapter:
//!
//! - **`SplunkService`**: the async seam every higher layer talks to
//! - **`RestClient`**: reqwest implementation against `/servicesNS`
//! - **Entities**: knowledge objects with content, ACL and field metadata
//! - **Namespaces**: app/sharing/owner context scoping every request

pub mod entity;
pub mod error;
pub mod namespace;
pub mod rest;
pub mod service;

pub use entity::{Access, Entity, FieldSpec};
pub use error::{ClientError, Result};
pub use namespace::{Namespace, Sharing};
pub use rest::{Credentials, RestClient, RestConfig};
pub use service::{JobStatus, SearchJob, SearchRequest, SplunkService};
