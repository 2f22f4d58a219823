//! [`TestSettings`]: settings files in a temporary directory.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// Smallest settings file that passes validation.
pub const MINIMAL_SETTINGS: &str = r#"
default:
  connections:
    local:
      host: localhost
      port: 8089
      username: admin
      password: changeme
      verify_tls: false
      allow_restart: true
    remote:
      host: splunk.example.com
      port: 8089
      token: abc123
  samples:
    errors:
      src: local
      query: index=_internal log_level=ERROR
      earliest: -1h
      latest: now
  splunkbase:
    username: sb-user
    password: sb-pass
    apps:
      lookup_editor:
        id: 1724
        version: 3.6.0
  docker:
    image: splunk/splunk:latest
  apps:
    exclude:
      - learned
      - splunk_instrumentation
"#;

/// A temporary settings directory.
pub struct TestSettings {
    temp_dir: TempDir,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSettings {
    /// Empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Directory holding [`MINIMAL_SETTINGS`] as `settings.yaml`.
    pub fn minimal() -> Self {
        let settings = Self::new();
        settings.write_settings(MINIMAL_SETTINGS);
        settings
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_settings(&self, yaml: &str) {
        self.write("settings.yaml", yaml);
    }

    pub fn write_secrets(&self, yaml: &str) {
        self.write(".secrets.yaml", yaml);
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}
