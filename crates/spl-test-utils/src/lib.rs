//! Shared test utilities for the Splunk management workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`service`]: [`MemoryService`], an in-memory Splunk instance
//! - [`docker`]: [`FakeDocker`], a recording docker engine
//! - [`prompt`]: [`ScriptedPrompter`] with queued answers
//! - [`settings`]: [`TestSettings`] writing settings files into a temp dir

pub mod docker;
pub mod prompt;
pub mod service;
pub mod settings;

pub use docker::FakeDocker;
pub use prompt::{Answer, ScriptedPrompter};
pub use service::{Call, MemoryService, entity, user_access};
pub use settings::{MINIMAL_SETTINGS, TestSettings};
