//! Local Splunk development container
//!
//! One container named `splunk`, with `etc` and `var` on labeled named
//! volumes so configuration survives recreating the container.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use spl_docker::{ContainerInfo, ContainerSpec, DockerApi, ImageInfo, VolumeInfo, VolumeMount};
use tracing::{debug, info, warn};

use crate::apps::discover;
use crate::config::{DockerConfig, Settings, SplunkbaseConfig};
use crate::prompt::{Prompter, pick};
use crate::{Error, Result};

pub const CONTAINER: &str = "splunk";
pub const APPS_PATH: &str = "/opt/splunk/etc/apps";
pub const DEFAULT_SPLUNK_PASSWORD: &str = "mySplunkDevPw";

const PROJECT_LABEL: (&str, &str) = ("io.nextpart.project", "nextpart_splunking");
const VOLUME_LABEL: &str = "io.nextpart.volume";
const VOLUMES: [(&str, &str); 2] = [
    ("splunk_var", "/opt/splunk/var"),
    ("splunk_etc", "/opt/splunk/etc"),
];
/// (host, container)
const PORTS: [(u16, u16); 4] = [(8000, 8000), (9997, 9997), (8088, 8088), (8090, 8089)];

/// Find `image` by tag, or pull it once the user agrees.
pub(crate) fn ensure_image(
    docker: &dyn DockerApi,
    image: &str,
    interactive: bool,
    prompter: &dyn Prompter,
    message: &str,
) -> Result<ImageInfo> {
    if let Some(found) = docker
        .images()?
        .into_iter()
        .find(|i| i.repo_tags.iter().any(|t| t == image))
    {
        return Ok(found);
    }
    info!("Couldn't find docker image '{}' locally.", image);
    if interactive && prompter.confirm(message, false)? {
        info!("Pulling '{}'", image);
        return Ok(docker.pull(image)?);
    }
    Err(Error::ImageNotFound(image.to_string()))
}

/// What [`DockerManager::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAction {
    Started,
    Restarted,
    AlreadyRunning,
}

/// Manages the local `splunk` container.
pub struct DockerManager {
    docker: Arc<dyn DockerApi>,
    config: DockerConfig,
    splunkbase: SplunkbaseConfig,
    exclude: Vec<String>,
    interactive: bool,
    state_wait: Duration,
}

impl DockerManager {
    pub fn new(settings: &Settings, docker: Arc<dyn DockerApi>, interactive: bool) -> Self {
        Self {
            docker,
            config: settings.docker.clone(),
            splunkbase: settings.splunkbase.clone(),
            exclude: settings.apps.exclude.clone(),
            interactive,
            state_wait: Duration::from_secs(30),
        }
    }

    /// Upper bound for waiting on a fresh container to report its state.
    pub fn with_state_wait(mut self, wait: Duration) -> Self {
        self.state_wait = wait;
        self
    }

    pub fn image(&self, prompter: &dyn Prompter) -> Result<ImageInfo> {
        ensure_image(
            self.docker.as_ref(),
            &self.config.image,
            self.interactive,
            prompter,
            "Do you want to pull the latest splunk container image?",
        )
    }

    /// The project volumes, created when missing.
    pub fn volumes(&self) -> Result<Vec<VolumeInfo>> {
        let existing = self.docker.volumes()?;
        let mut volumes = Vec::new();
        for (name, _) in VOLUMES {
            let volume = match existing.iter().find(|v| v.name == name) {
                Some(v) => v.clone(),
                None => {
                    let labels = BTreeMap::from([
                        (PROJECT_LABEL.0.to_string(), PROJECT_LABEL.1.to_string()),
                        (VOLUME_LABEL.to_string(), name.to_string()),
                    ]);
                    info!("Creating docker volume '{}'", name);
                    self.docker.create_volume(name, &labels)?
                }
            };
            volumes.push(volume);
        }
        Ok(volumes)
    }

    /// The `splunk` container, if it exists.
    pub fn status(&self) -> Result<Option<ContainerInfo>> {
        Ok(self
            .docker
            .containers(true)?
            .into_iter()
            .find(|c| c.has_name(CONTAINER)))
    }

    /// Look up the container or create it after confirmation.
    pub fn get_or_create_container(
        &self,
        prompter: &dyn Prompter,
    ) -> Result<Option<ContainerInfo>> {
        if let Some(container) = self.status()? {
            return Ok(Some(container));
        }
        info!("Splunk container does not exist.");
        if self.interactive && !prompter.confirm("Do you want to create the container?", true)? {
            return Ok(None);
        }

        let image = self.image(prompter)?;
        self.volumes()?;
        let spec = ContainerSpec {
            name: CONTAINER.to_string(),
            hostname: CONTAINER.to_string(),
            image: image.id,
            environment: self.environment(prompter)?,
            mounts: VOLUMES
                .iter()
                .map(|(source, target)| VolumeMount {
                    source: source.to_string(),
                    target: target.to_string(),
                })
                .collect(),
            ports: PORTS.to_vec(),
            user: Some("root".to_string()),
            ..ContainerSpec::default()
        };
        let id = self.docker.create_container(&spec)?;
        info!("Created splunk container {}", id);
        self.status()
    }

    /// Container environment; `docker.environment` keys win over defaults.
    fn environment(&self, prompter: &dyn Prompter) -> Result<Vec<String>> {
        let mut env = BTreeMap::from([
            ("SPLUNK_START_ARGS".to_string(), "--accept-license".to_string()),
            ("SPLUNK_PASSWORD".to_string(), DEFAULT_SPLUNK_PASSWORD.to_string()),
            ("SPLUNKBASE_USERNAME".to_string(), self.splunkbase.username.clone()),
            ("SPLUNKBASE_PASSWORD".to_string(), self.splunkbase.password.clone()),
        ]);
        let apps_url = self.splunkbase_apps_url(prompter)?;
        if !apps_url.is_empty() {
            env.insert("SPLUNK_APPS_URL".to_string(), apps_url);
        }
        env.extend(self.config.environment.clone());
        Ok(env.into_iter().map(|(k, v)| format!("{k}={v}")).collect())
    }

    /// Comma-separated download URLs of the chosen Splunkbase apps.
    fn splunkbase_apps_url(&self, prompter: &dyn Prompter) -> Result<String> {
        let names: Vec<String> = self.splunkbase.apps.keys().cloned().collect();
        let chosen = if self.interactive && !names.is_empty() {
            let indices = prompter.multi_select(
                "What apps do you want to install from Splunkbase?",
                &names,
                &vec![true; names.len()],
            )?;
            pick(&names, &indices)
        } else {
            names
        };
        Ok(chosen
            .iter()
            .filter_map(|name| self.splunkbase.apps.get(name))
            .map(|app| app.download_url())
            .collect::<Vec<_>>()
            .join(","))
    }

    /// Bring the container up, creating it when needed.
    pub fn start(&self, prompter: &dyn Prompter) -> Result<Option<StartAction>> {
        if self.get_or_create_container(prompter)?.is_none() {
            return Ok(None);
        }

        // A just-created container can take a moment to show up with a state.
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_elapsed_time(Some(self.state_wait))
            .build();
        let container = backoff::retry(policy, || match self.status() {
            Ok(Some(c)) if !c.state.is_empty() => Ok(c),
            Ok(_) => Err(backoff::Error::transient(Error::ContainerMissing(
                CONTAINER.to_string(),
            ))),
            Err(e) => Err(backoff::Error::permanent(e)),
        })
        .map_err(|e| match e {
            backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
        })?;

        let action = if container.is_created() {
            info!("Container starting...");
            self.docker.start(&container.id)?;
            StartAction::Started
        } else if container.is_exited() {
            info!("Restarting stopped Splunk container.");
            self.docker.restart(&container.id)?;
            StartAction::Restarted
        } else if container.is_up() {
            info!("Container already exists and is running.");
            StartAction::AlreadyRunning
        } else {
            warn!(
                "Container in unexpected state '{}', restarting.",
                container.status
            );
            self.docker.restart(&container.id)?;
            StartAction::Restarted
        };
        Ok(Some(action))
    }

    /// Stop the container; false when nothing was running.
    pub fn stop(&self) -> Result<bool> {
        match self.status()? {
            Some(container) if container.is_up() => {
                self.docker.stop(&container.id)?;
                info!("Stopped splunk container.");
                Ok(true)
            }
            _ => {
                warn!("No Splunk Container to stop!");
                Ok(false)
            }
        }
    }

    /// Running container, started after confirmation when it is not.
    fn ensure_running(&self, prompter: &dyn Prompter) -> Result<ContainerInfo> {
        if let Some(container) = self.status()?
            && container.is_up()
        {
            return Ok(container);
        }
        if !self.interactive || prompter.confirm("Do you want to start the container?", true)? {
            self.start(prompter)?;
        }
        match self.status()? {
            Some(container) if container.is_up() => Ok(container),
            _ => Err(Error::ContainerNotRunning(CONTAINER.to_string())),
        }
    }

    /// Top-level apps installed in the container, without excluded ones.
    pub fn list(&self) -> Result<Vec<String>> {
        let output = self.docker.exec(
            CONTAINER,
            APPS_PATH,
            &[
                "bash".to_string(),
                "-c".to_string(),
                r"find . -name app.conf -exec dirname {} \; | xargs dirname".to_string(),
            ],
        )?;
        Ok(parse_app_dirs(&output, &self.exclude))
    }

    /// Copy local apps matching `pattern` below `path` into the container.
    pub fn upload(
        &self,
        path: &Path,
        pattern: Option<&str>,
        prompter: &dyn Prompter,
    ) -> Result<Vec<String>> {
        if !path.exists() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }
        self.ensure_running(prompter)?;

        let mut apps = discover(path, pattern)?;
        if apps.is_empty() {
            warn!("Current path does not contain any Splunk Apps. Hint: Try --path");
            return Ok(Vec::new());
        }
        if self.interactive {
            let names: Vec<String> = apps.iter().map(|a| a.dir_name()).collect();
            let chosen = prompter.multi_select(
                "What apps do you want to upload to your instance?",
                &names,
                &vec![true; names.len()],
            )?;
            apps = pick(&apps, &chosen);
        }

        let mut uploaded = Vec::new();
        for app in &apps {
            let name = app.dir_name();
            let archive = archive_dir(&app.path, &name)?;
            self.docker.put_archive(CONTAINER, APPS_PATH, &archive)?;
            debug!("Uploaded {} ({} bytes)", name, archive.len());
            uploaded.push(name);
        }
        info!("Uploaded apps: {:?}", uploaded);
        for name in &uploaded {
            self.fix_app_permissions(Some(name), prompter)?;
        }
        Ok(uploaded)
    }

    /// Copy apps from the container into `path`.
    ///
    /// Without a pattern, non-interactive runs only refresh apps already
    /// present under `path`.
    pub fn download(
        &self,
        path: &Path,
        pattern: Option<&str>,
        prompter: &dyn Prompter,
    ) -> Result<Vec<String>> {
        self.ensure_running(prompter)?;
        if !path.exists() {
            warn!("Path does not exist: {}", path.display());
            let create = !self.interactive
                || prompter.confirm(
                    &format!("Do you want to create the folder: {}?", path.display()),
                    true,
                )?;
            if !create {
                return Err(Error::PathNotFound(path.to_path_buf()));
            }
            std::fs::create_dir_all(path)?;
        }

        let container_apps = self.list()?;
        let selected = match pattern {
            Some(pattern) => {
                let needle = pattern.replace('*', "");
                let matching: Vec<String> = container_apps
                    .into_iter()
                    .filter(|a| a.contains(&needle))
                    .collect();
                self.choose("What apps do you want to download?", matching, prompter)?
            }
            None if self.interactive => {
                self.choose("What apps do you want to download?", container_apps, prompter)?
            }
            None => {
                let local: Vec<String> =
                    discover(path, None)?.iter().map(|a| a.dir_name()).collect();
                container_apps
                    .into_iter()
                    .filter(|a| local.contains(a))
                    .collect()
            }
        };

        for app in &selected {
            let archive = self
                .docker
                .get_archive(CONTAINER, &format!("{APPS_PATH}/{app}"))?;
            tar::Archive::new(Cursor::new(archive)).unpack(path)?;
            debug!("Downloaded {} into {}", app, path.display());
        }
        info!("Downloaded apps: {:?}", selected);
        Ok(selected)
    }

    fn choose(
        &self,
        message: &str,
        items: Vec<String>,
        prompter: &dyn Prompter,
    ) -> Result<Vec<String>> {
        if !self.interactive || items.is_empty() {
            return Ok(items);
        }
        let chosen = prompter.multi_select(message, &items, &vec![true; items.len()])?;
        Ok(pick(&items, &chosen))
    }

    /// Reset ownership and modes of app files inside the container.
    pub fn fix_app_permissions(
        &self,
        app: Option<&str>,
        prompter: &dyn Prompter,
    ) -> Result<Vec<String>> {
        let container_apps = self.list()?;
        let apps = match app {
            Some(app) if container_apps.iter().any(|a| a == app) => vec![app.to_string()],
            Some(app) => {
                warn!("App '{}' is not installed in the container.", app);
                return Ok(Vec::new());
            }
            None => self.choose(
                "For which apps do you want to fix permissions?",
                container_apps,
                prompter,
            )?,
        };

        for app in &apps {
            let output = self.docker.exec(
                CONTAINER,
                APPS_PATH,
                &["bash".to_string(), "-c".to_string(), permissions_script(app)],
            )?;
            debug!("{}", output);
        }
        info!("Fixed Permissions for Splunk Apps: {:?}", apps);
        Ok(apps)
    }
}

/// App directory names from `find ... | xargs dirname` output.
fn parse_app_dirs(output: &str, exclude: &[String]) -> Vec<String> {
    let mut apps: Vec<String> = output
        .lines()
        .map(str::trim)
        .map(|line| line.strip_prefix("./").unwrap_or(line))
        .filter(|name| !name.is_empty() && *name != "." && !name.contains('/'))
        .filter(|name| !exclude.iter().any(|e| e == name))
        .map(str::to_string)
        .collect();
    apps.sort();
    apps.dedup();
    apps
}

fn permissions_script(app: &str) -> String {
    let app = shell_quote(app);
    format!(
        "chown -R splunk:splunk {app} && chmod -R u=rwX,go=rX {app} \
         && find {app} -type f -name '*.sh' -exec chmod u+x {{}} \\;"
    )
}

/// Single-quote `value` for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Tar `dir` with `name` as its root entry.
fn archive_dir(dir: &Path, name: &str) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    builder.append_dir_all(name, dir)?;
    Ok(builder.into_inner()?)
}
