//! [`FakeDocker`]: a recording in-memory [`DockerApi`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use spl_docker::{
    ContainerInfo, ContainerSpec, DockerApi, DockerError, ImageInfo, Result, VolumeInfo,
};

type StartHook = Box<dyn Fn(&ContainerSpec) + Send + Sync>;

struct Container {
    info: ContainerInfo,
    spec: ContainerSpec,
}

#[derive(Default)]
struct State {
    images: Vec<ImageInfo>,
    pullable: Vec<String>,
    containers: Vec<Container>,
    created: Vec<ContainerSpec>,
    volumes: Vec<VolumeInfo>,
    archives: BTreeMap<String, Vec<u8>>,
    uploads: Vec<(String, String, Vec<u8>)>,
    exec_outputs: Vec<(String, String)>,
    calls: Vec<String>,
    next_id: u32,
}

/// Docker engine held in memory.
///
/// Containers with a start hook run the hook on `start` and exit right
/// after, like a one-shot job container.
#[derive(Default)]
pub struct FakeDocker {
    state: Mutex<State>,
    hooks: BTreeMap<String, StartHook>,
}

fn status_for(state: &str) -> String {
    match state {
        "running" => "Up 1 second".to_string(),
        "exited" => "Exited (0) 1 second ago".to_string(),
        "created" => "Created".to_string(),
        other => other.to_string(),
    }
}

fn set_state(info: &mut ContainerInfo, state: &str) {
    info.state = state.to_string();
    info.status = status_for(state);
}

fn not_found(what: &str) -> DockerError {
    DockerError::NotFound(what.to_string())
}

impl FakeDocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A local image tagged `tag`.
    pub fn with_image(self, tag: &str) -> Self {
        {
            let mut state = self.lock();
            let id = format!("sha256:{:04}", state.images.len() + 1);
            state.images.push(ImageInfo {
                id,
                repo_tags: vec![tag.to_string()],
            });
        }
        self
    }

    /// `tag` can be pulled from the registry.
    pub fn with_pullable(self, tag: &str) -> Self {
        self.lock().pullable.push(tag.to_string());
        self
    }

    /// An existing container in `state` (`running`, `exited`, `created`).
    pub fn with_container(self, name: &str, state: &str) -> Self {
        {
            let mut s = self.lock();
            let id = s.allocate_id();
            s.containers.push(Container {
                info: ContainerInfo {
                    id,
                    names: vec![name.to_string()],
                    image: "splunk/splunk:latest".to_string(),
                    state: state.to_string(),
                    status: status_for(state),
                },
                spec: ContainerSpec {
                    name: name.to_string(),
                    ..ContainerSpec::default()
                },
            });
        }
        self
    }

    /// `exec` output for commands containing `needle`.
    pub fn with_exec_output(self, needle: &str, output: &str) -> Self {
        self.lock()
            .exec_outputs
            .push((needle.to_string(), output.to_string()));
        self
    }

    /// Tar archive returned by `get_archive` for `path`.
    pub fn with_archive(self, path: &str, tar: Vec<u8>) -> Self {
        self.lock().archives.insert(path.to_string(), tar);
        self
    }

    /// Run `hook` when the container named `name` starts; it exits afterwards.
    pub fn on_start(
        mut self,
        name: &str,
        hook: impl Fn(&ContainerSpec) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.insert(name.to_string(), Box::new(hook));
        self
    }

    /// Every engine call as `<verb> <target>`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn container(&self, name: &str) -> Option<ContainerInfo> {
        self.lock()
            .containers
            .iter()
            .find(|c| c.info.has_name(name))
            .map(|c| c.info.clone())
    }

    /// Specs of containers created through the API, in order.
    pub fn created(&self) -> Vec<ContainerSpec> {
        self.lock().created.clone()
    }

    /// `(container, path, tar)` of every `put_archive`.
    pub fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.lock().uploads.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:012x}", self.next_id)
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Container> {
        self.containers
            .iter_mut()
            .find(|c| c.info.id == key || c.info.has_name(key))
    }
}

impl DockerApi for FakeDocker {
    fn images(&self) -> Result<Vec<ImageInfo>> {
        Ok(self.lock().images.clone())
    }

    fn pull(&self, image: &str) -> Result<ImageInfo> {
        let mut state = self.lock();
        state.calls.push(format!("pull {image}"));
        if !state.pullable.iter().any(|p| p == image) {
            return Err(not_found(image));
        }
        let info = ImageInfo {
            id: format!("sha256:{:04}", state.images.len() + 1),
            repo_tags: vec![image.to_string()],
        };
        state.images.push(info.clone());
        Ok(info)
    }

    fn containers(&self, all: bool) -> Result<Vec<ContainerInfo>> {
        Ok(self
            .lock()
            .containers
            .iter()
            .map(|c| c.info.clone())
            .filter(|c| all || c.is_up())
            .collect())
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.lock();
        state.calls.push(format!("create {}", spec.name));
        if state.containers.iter().any(|c| c.info.has_name(&spec.name)) {
            return Err(DockerError::CommandFailed {
                command: "create".to_string(),
                code: 125,
                stderr: format!("name {} already in use", spec.name),
            });
        }
        let id = state.allocate_id();
        state.created.push(spec.clone());
        state.containers.push(Container {
            info: ContainerInfo {
                id: id.clone(),
                names: vec![spec.name.clone()],
                image: spec.image.clone(),
                state: "created".to_string(),
                status: status_for("created"),
            },
            spec: spec.clone(),
        });
        Ok(id)
    }

    fn start(&self, container: &str) -> Result<()> {
        let spec = {
            let mut state = self.lock();
            state.calls.push(format!("start {container}"));
            let entry = state.find_mut(container).ok_or_else(|| not_found(container))?;
            set_state(&mut entry.info, "running");
            entry.spec.clone()
        };
        if let Some(hook) = self.hooks.get(&spec.name) {
            hook(&spec);
            let mut state = self.lock();
            if let Some(entry) = state.find_mut(container) {
                set_state(&mut entry.info, "exited");
            }
        }
        Ok(())
    }

    fn restart(&self, container: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("restart {container}"));
        let entry = state.find_mut(container).ok_or_else(|| not_found(container))?;
        set_state(&mut entry.info, "running");
        Ok(())
    }

    fn stop(&self, container: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("stop {container}"));
        let entry = state.find_mut(container).ok_or_else(|| not_found(container))?;
        set_state(&mut entry.info, "exited");
        Ok(())
    }

    fn remove(&self, container: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("remove {container}"));
        let before = state.containers.len();
        state
            .containers
            .retain(|c| c.info.id != container && !c.info.has_name(container));
        if state.containers.len() == before {
            return Err(not_found(container));
        }
        Ok(())
    }

    fn logs(&self, container: &str) -> Result<String> {
        Ok(format!("logs of {container}\n"))
    }

    fn exec(&self, container: &str, _workdir: &str, cmd: &[String]) -> Result<String> {
        let mut state = self.lock();
        let line = cmd.join(" ");
        state.calls.push(format!("exec {container} {line}"));
        let running = state
            .find_mut(container)
            .map(|c| c.info.is_up())
            .unwrap_or(false);
        if !running {
            return Err(DockerError::CommandFailed {
                command: "exec".to_string(),
                code: 1,
                stderr: format!("container {container} is not running"),
            });
        }
        Ok(state
            .exec_outputs
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }

    fn put_archive(&self, container: &str, path: &str, tar: &[u8]) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(format!("put_archive {container} {path}"));
        state
            .uploads
            .push((container.to_string(), path.to_string(), tar.to_vec()));
        Ok(())
    }

    fn get_archive(&self, container: &str, path: &str) -> Result<Vec<u8>> {
        let mut state = self.lock();
        state.calls.push(format!("get_archive {container} {path}"));
        state.archives.get(path).cloned().ok_or_else(|| not_found(path))
    }

    fn volumes(&self) -> Result<Vec<VolumeInfo>> {
        Ok(self.lock().volumes.clone())
    }

    fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<VolumeInfo> {
        let mut state = self.lock();
        state.calls.push(format!("create_volume {name}"));
        let volume = VolumeInfo {
            name: name.to_string(),
            labels: labels.clone(),
        };
        state.volumes.push(volume.clone());
        Ok(volume)
    }
}
