//! Local Splunk apps: discovery, listing, packaging and cloud vetting

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use spl_docker::{Bind, ContainerSpec, DockerApi};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::appinspect::AppInspectClient;
use crate::docker::ensure_image;
use crate::prompt::{Prompter, pick};
use crate::table::Table;
use crate::{Error, Result};

const PACKAGE_CONTAINER: &str = "splunk_package";
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// `[stanza] -> key -> value` of a `.conf` file.
pub type ConfFile = BTreeMap<String, BTreeMap<String, String>>;

/// A Splunk app directory on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalApp {
    pub id: String,
    pub label: String,
    pub version: String,
    pub path: PathBuf,
}

impl LocalApp {
    /// Read `default/app.conf` with `local/app.conf` on top.
    pub fn from_dir(path: &Path) -> Result<Self> {
        let mut conf = ConfFile::new();
        for layer in ["default", "local"] {
            let file = path.join(layer).join("app.conf");
            if file.is_file() {
                for (stanza, settings) in parse_conf(&spl_fs::io::read_text(&file)?) {
                    conf.entry(stanza).or_default().extend(settings);
                }
            }
        }

        let get = |stanza: &str, key: &str| conf.get(stanza).and_then(|s| s.get(key)).cloned();
        let id = get("package", "id").unwrap_or_else(|| dir_name(path));
        let label = get("ui", "label").unwrap_or_else(|| id.clone());
        let version = get("launcher", "version")
            .or_else(|| get("id", "version"))
            .unwrap_or_default();

        Ok(Self {
            id,
            label,
            version,
            path: path.to_path_buf(),
        })
    }

    /// Name of the app directory.
    pub fn dir_name(&self) -> String {
        dir_name(&self.path)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Parse `.conf` text: `[stanza]` headers, `key = value` lines, `#` comments
/// and trailing-backslash continuations.
pub fn parse_conf(text: &str) -> ConfFile {
    let mut conf = ConfFile::new();
    let mut stanza = "default".to_string();
    let mut pending: Option<(String, String)> = None;

    for raw in text.lines() {
        if let Some((key, mut value)) = pending.take() {
            let line = raw.trim_end();
            match line.strip_suffix('\\') {
                Some(part) => {
                    value.push('\n');
                    value.push_str(part);
                    pending = Some((key, value));
                }
                None => {
                    value.push('\n');
                    value.push_str(line);
                    conf.entry(stanza.clone()).or_default().insert(key, value);
                }
            }
            continue;
        }

        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            stanza = name.trim().to_string();
            conf.entry(stanza.clone()).or_default();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let (key, value) = (key.trim().to_string(), value.trim());
            match value.strip_suffix('\\') {
                Some(part) => pending = Some((key, part.trim_end().to_string())),
                None => {
                    conf.entry(stanza.clone())
                        .or_default()
                        .insert(key, value.to_string());
                }
            }
        }
    }
    if let Some((key, value)) = pending {
        conf.entry(stanza).or_default().insert(key, value);
    }
    conf
}

/// Glob over app directory names, `*` and `?` wildcards.
fn name_matcher(pattern: Option<&str>) -> Result<Option<Regex>> {
    let Some(pattern) = pattern.filter(|p| !p.is_empty() && *p != "*") else {
        return Ok(None);
    };
    let mut regex = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex)
        .map(Some)
        .map_err(|e| Error::InvalidSettings(format!("invalid app pattern '{pattern}': {e}")))
}

/// Find app directories below `path`, sorted by id.
///
/// An app is a directory with `default/app.conf` or `local/app.conf`.
pub fn discover(path: &Path, pattern: Option<&str>) -> Result<Vec<LocalApp>> {
    let matcher = name_matcher(pattern)?;
    let mut dirs: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == "app.conf")
        .filter_map(|e| {
            let layer = e.path().parent()?;
            let layer_name = layer.file_name()?;
            (layer_name == "default" || layer_name == "local")
                .then(|| layer.parent().map(Path::to_path_buf))
                .flatten()
        })
        .filter(|dir| {
            matcher
                .as_ref()
                .is_none_or(|m| m.is_match(&dir_name(dir)))
        })
        .collect();
    dirs.sort();
    dirs.dedup();

    let mut apps = dirs
        .iter()
        .map(|dir| LocalApp::from_dir(dir))
        .collect::<Result<Vec<_>>>()?;
    apps.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(count = apps.len(), path = %path.display(), "Discovered apps");
    Ok(apps)
}

/// Outcome of packaging one app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagingOutcome {
    pub app: String,
    /// Whether the packaging container ran (false: older result reused)
    pub built: bool,
    pub appinspect_log: Option<String>,
    /// Produced packages with their sha256 checksums
    pub packages: Vec<(PathBuf, String)>,
}

/// Outcome of validating one app.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub packaging: PackagingOutcome,
    /// `summary` of the AppInspect report when cloud vetting ran
    pub cloudvet_summary: Option<Value>,
}

/// Local apps below a working directory.
pub struct AppsManager {
    work_dir: PathBuf,
    apps: Vec<LocalApp>,
    interactive: bool,
    docker: Arc<dyn DockerApi>,
    package_image: String,
    appinspect: AppInspectClient,
    poll_interval: Duration,
}

impl AppsManager {
    pub fn new(
        work_dir: &Path,
        pattern: Option<&str>,
        interactive: bool,
        docker: Arc<dyn DockerApi>,
        package_image: &str,
        appinspect: AppInspectClient,
    ) -> Result<Self> {
        let work_dir = dunce::canonicalize(work_dir)
            .map_err(|_| Error::PathNotFound(work_dir.to_path_buf()))?;
        info!("Searching apps in {}", work_dir.display());
        Ok(Self {
            apps: discover(&work_dir, pattern)?,
            work_dir,
            interactive,
            docker,
            package_image: package_image.to_string(),
            appinspect,
            poll_interval: POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn apps(&self) -> &[LocalApp] {
        &self.apps
    }

    /// `<work_dir>/../dist`
    pub fn dist_dir(&self) -> PathBuf {
        self.work_dir
            .parent()
            .unwrap_or(&self.work_dir)
            .join("dist")
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new("Local Splunk Applications", ["ID", "Name", "Version"]);
        for app in &self.apps {
            table.push(vec![app.id.clone(), app.label.clone(), app.version.clone()]);
        }
        table
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["ID", "Name", "Version"])?;
        for app in &self.apps {
            writer.write_record([&app.id, &app.label, &app.version])?;
        }
        writer.flush()?;
        info!("Wrote {} apps to {}", self.apps.len(), path.display());
        Ok(())
    }

    /// Package every selected app and optionally cloud-vet the packages.
    pub async fn validate(
        &self,
        force: bool,
        cloudvet: Option<bool>,
        prompter: &dyn Prompter,
    ) -> Result<Vec<ValidationOutcome>> {
        let mut apps = self.apps.clone();
        if self.interactive && !apps.is_empty() {
            let ids: Vec<String> = apps.iter().map(|a| a.id.clone()).collect();
            let chosen = prompter.multi_select(
                "Select the apps you want to validate:",
                &ids,
                &vec![false; ids.len()],
            )?;
            apps = pick(&apps, &chosen);
        }
        if apps.is_empty() {
            return Ok(Vec::new());
        }

        let cloudvet = match cloudvet {
            Some(cloudvet) => cloudvet,
            None if self.interactive => {
                prompter.confirm("Do you want to validate packages via cloud vetting?", false)?
            }
            None => false,
        };

        let dist = self.dist_dir();
        let mut outcomes = Vec::new();
        for app in &apps {
            let packaging = self.run_packaging(app, &dist, force, prompter).await?;
            let cloudvet_summary = if cloudvet {
                self.run_cloudvetting(&app.id, &dist, force, prompter).await?
            } else {
                None
            };
            outcomes.push(ValidationOutcome {
                packaging,
                cloudvet_summary,
            });
        }
        Ok(outcomes)
    }

    /// Build, validate and AppInspect one app in the packaging container.
    pub async fn run_packaging(
        &self,
        app: &LocalApp,
        dist: &Path,
        force: bool,
        prompter: &dyn Prompter,
    ) -> Result<PackagingOutcome> {
        let name = app.dir_name();
        let result_dir = dist.join(&name);

        let run = if force || !result_dir.exists() {
            true
        } else if self.interactive {
            prompter.confirm(
                "There is already a built package for this application. Do you want to overwrite it?",
                true,
            )?
        } else {
            false
        };

        if run {
            self.package(app, &name, dist, prompter).await?;
            if !result_dir.exists() {
                error!("Packaging produced no output files!");
            }
            info!("Finished packaging app '{}'.", name);
        } else {
            info!("Using older packaging result for '{}'.", name);
        }

        let log_file = result_dir.join(format!("{name}_appinspect.log"));
        let appinspect_log = if log_file.is_file() {
            let log = spl_fs::io::read_text(&log_file)?;
            info!("{}", log);
            Some(log)
        } else {
            None
        };

        let packages = packages_in(&result_dir)?
            .into_iter()
            .map(|p| {
                let checksum = spl_fs::file_digest(&p)?;
                info!("Package {} ({})", p.display(), checksum);
                Ok((p, checksum))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PackagingOutcome {
            app: name,
            built: run,
            appinspect_log,
            packages,
        })
    }

    async fn package(
        &self,
        app: &LocalApp,
        name: &str,
        dist: &Path,
        prompter: &dyn Prompter,
    ) -> Result<()> {
        let image = ensure_image(
            self.docker.as_ref(),
            &self.package_image,
            self.interactive,
            prompter,
            "Do you want to pull the latest splunk packaging container image?",
        )?;

        for stale in self
            .docker
            .containers(true)?
            .into_iter()
            .filter(|c| c.has_name(PACKAGE_CONTAINER))
        {
            info!("Package container already exists.");
            if !self.interactive
                || prompter.confirm("Do you want to delete the old packaging container?", true)?
            {
                self.docker.remove(&stale.id)?;
            }
        }

        std::fs::create_dir_all(dist)?;
        let spec = ContainerSpec {
            name: PACKAGE_CONTAINER.to_string(),
            hostname: PACKAGE_CONTAINER.to_string(),
            image: image.id,
            environment: vec![
                "APP_DIR=/apps".to_string(),
                "PKG_DIR=/dist".to_string(),
                format!("MYUSER={}", owner_uid(&app.path)),
            ],
            binds: vec![
                Bind {
                    host: app.path.display().to_string(),
                    container: format!("/apps/{name}"),
                    mode: "rw".to_string(),
                },
                Bind {
                    host: dist.display().to_string(),
                    container: "/dist".to_string(),
                    mode: "rw".to_string(),
                },
            ],
            ..ContainerSpec::default()
        };

        let id = self.docker.create_container(&spec)?;
        self.docker.start(&id)?;
        info!("Running application packaging container for '{}'.", name);
        loop {
            let running = self
                .docker
                .containers(true)?
                .into_iter()
                .find(|c| c.id.starts_with(&id) || id.starts_with(&c.id));
            match running {
                Some(c) if !c.is_exited() => tokio::time::sleep(self.poll_interval).await,
                _ => break,
            }
        }
        debug!("{}", self.docker.logs(&id)?);
        debug!("Removing application packaging container for {}.", name);
        self.docker.remove(&id)?;
        Ok(())
    }

    /// Submit the package of `app_id` to AppInspect and store the reports.
    ///
    /// Returns the report summary, or `None` when nothing ran.
    pub async fn run_cloudvetting(
        &self,
        app_id: &str,
        dist: &Path,
        force: bool,
        prompter: &dyn Prompter,
    ) -> Result<Option<Value>> {
        let Some(package) = packages_in(&dist.join(app_id))?.into_iter().next() else {
            warn!("Could not find package for '{}'.", app_id);
            return Ok(None);
        };
        info!("Running cloudvetting for '{}'", app_id);

        let html_report = dist.join(format!("{app_id}_appinspect.html"));
        let run = if force || !html_report.exists() {
            true
        } else if self.interactive {
            prompter.confirm(
                "There is already a cloudvetting report for this application. Do you want to overwrite it?",
                true,
            )?
        } else {
            false
        };
        if !run {
            info!("Using older cloudvetting report for '{}'.", app_id);
            return Ok(None);
        }

        let token = self.appinspect.login().await?;
        let request_id = self.appinspect.submit(&token, &package).await?;
        self.appinspect.wait(&token, &request_id).await?;
        info!("Cloud vetting with ID '{}' for '{}' finished.", request_id, app_id);

        let report = self.appinspect.report_json(&token, &request_id).await?;
        spl_fs::ConfigStore::new().save(&dist.join(format!("{app_id}_appinspect.json")), &report)?;
        let html = self.appinspect.report_html(&token, &request_id).await?;
        spl_fs::io::write_text(&html_report, &html)?;

        Ok(report.get("summary").cloned())
    }
}

/// `*.tar.gz` files in `dir`, sorted.
fn packages_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut packages: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.to_string_lossy().ends_with(".tar.gz"))
        .collect();
    packages.sort();
    Ok(packages)
}

/// Owner of the app directory, handed to the packaging container so output
/// files belong to the same user.
#[cfg(unix)]
fn owner_uid(path: &Path) -> u32 {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path).map(|m| m.uid()).unwrap_or(0)
}

#[cfg(not(unix))]
fn owner_uid(_path: &Path) -> u32 {
    0
}
