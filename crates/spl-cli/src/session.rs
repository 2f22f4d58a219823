//! Per-invocation state shared by the commands
//!
//! Holds the resolved settings, the global flags and the prompter, and
//! builds connections and managers from them.

use std::path::Path;
use std::sync::Arc;

use spl_core::{
    AcceptDefaults, ConnectionAdapter, DockerManager, NamespaceRequest, Prompter, Settings,
    SettingsLoader,
};
use spl_docker::{DockerApi, DockerCli};
use tracing::debug;

use crate::cli::{Cli, NamespaceArgs};
use crate::error::Result;
use crate::interactive::DialoguerPrompter;

pub struct Session {
    settings: Settings,
    interactive: bool,
    context: bool,
    prompter: Box<dyn Prompter>,
}

impl Session {
    pub fn new(settings: Settings, interactive: bool, context: bool) -> Self {
        let prompter: Box<dyn Prompter> = if interactive {
            Box::new(DialoguerPrompter)
        } else {
            Box::new(AcceptDefaults)
        };
        Self {
            settings,
            interactive,
            context,
            prompter,
        }
    }

    /// Load settings from `--settings-dir`, or from `cwd`.
    pub fn load(cli: &Cli, cwd: &Path) -> Result<Self> {
        let dir = cli.settings_dir.as_deref().unwrap_or(cwd);
        debug!(?dir, "Initializing settings");
        let settings = SettingsLoader::new(dir).load()?;
        Ok(Self::new(settings, cli.interactive, cli.context))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn interactive(&self) -> bool {
        self.interactive
    }

    pub fn prompter(&self) -> &dyn Prompter {
        self.prompter.as_ref()
    }

    /// Connect to a configured instance and apply the namespace context.
    pub async fn connect(
        &self,
        name: &str,
        namespace: &NamespaceArgs,
    ) -> Result<ConnectionAdapter> {
        let adapter = ConnectionAdapter::connect(name, self.settings.connection(name)?).await?;
        self.apply_namespace(&adapter, namespace).await?;
        Ok(adapter)
    }

    pub async fn apply_namespace(
        &self,
        adapter: &ConnectionAdapter,
        namespace: &NamespaceArgs,
    ) -> Result<()> {
        let request = NamespaceRequest {
            app: namespace.app.clone(),
            sharing: namespace.sharing.clone(),
            owner: namespace.owner.clone(),
        };
        adapter
            .namespace(&request, self.context, self.prompter(), self.interactive)
            .await?;
        Ok(())
    }

    pub fn docker_api(&self) -> Arc<dyn DockerApi> {
        Arc::new(DockerCli::new(&self.settings.docker.socket))
    }

    pub fn docker(&self) -> DockerManager {
        DockerManager::new(&self.settings, self.docker_api(), self.interactive)
    }
}
