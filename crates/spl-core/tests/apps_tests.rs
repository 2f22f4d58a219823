//! Tests for local app discovery, packaging and cloud vetting

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use spl_core::config::SplunkbaseConfig;
use spl_core::{AcceptDefaults, AppInspectClient, AppsManager, Error};
use spl_docker::ContainerSpec;
use spl_test_utils::{Answer, FakeDocker, ScriptedPrompter};
use tempfile::TempDir;
use wiremock::matchers::{basic_auth, bearer_token, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PACKAGE_IMAGE: &str = "nextpart/splunk-package:latest";

fn write_app(root: &Path, dir: &str, id: &str, label: &str, version: &str) {
    let default = root.join(dir).join("default");
    std::fs::create_dir_all(&default).unwrap();
    std::fs::write(
        default.join("app.conf"),
        format!("[package]\nid = {id}\n\n[ui]\nlabel = {label}\n\n[launcher]\nversion = {version}\n"),
    )
    .unwrap();
}

/// `<tmp>/apps/{TA-web,SA-alerts}` with `<tmp>/dist` as distribution dir.
fn workspace() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let apps = tmp.path().join("apps");
    write_app(&apps, "TA-web", "TA-web", "Web Add-on", "1.2.0");
    write_app(&apps, "SA-alerts", "SA-alerts", "Alerts", "0.9.1");
    (tmp, apps)
}

/// Emulates the packaging image: one package and an AppInspect log per app.
fn fake_packager(spec: &ContainerSpec) {
    let dist = spec
        .binds
        .iter()
        .find(|b| b.container == "/dist")
        .map(|b| PathBuf::from(&b.host))
        .unwrap();
    for bind in spec.binds.iter().filter(|b| b.container.starts_with("/apps/")) {
        let name = bind.container.trim_start_matches("/apps/");
        let out = dist.join(name);
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join(format!("{name}-1.0.0.tar.gz")), b"package bytes").unwrap();
        std::fs::write(out.join(format!("{name}_appinspect.log")), "0 failures").unwrap();
    }
}

fn appinspect(config: &SplunkbaseConfig) -> AppInspectClient {
    AppInspectClient::new(config)
        .unwrap()
        .with_poll_interval(Duration::from_millis(1))
}

fn manager(work: &Path, docker: Arc<FakeDocker>, interactive: bool) -> AppsManager {
    AppsManager::new(
        work,
        None,
        interactive,
        docker,
        PACKAGE_IMAGE,
        appinspect(&SplunkbaseConfig::default()),
    )
    .unwrap()
    .with_poll_interval(Duration::from_millis(1))
}

mod listing_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apps_are_listed_sorted_by_id() {
        let (_tmp, work) = workspace();
        let manager = manager(&work, Arc::new(FakeDocker::new()), false);

        let table = manager.table();
        assert_eq!(table.column("ID"), vec!["SA-alerts", "TA-web"]);
        assert_eq!(table.column("Name"), vec!["Alerts", "Web Add-on"]);
        assert_eq!(table.column("Version"), vec!["0.9.1", "1.2.0"]);
    }

    #[test]
    fn test_pattern_limits_discovery() {
        let (_tmp, work) = workspace();
        let manager = AppsManager::new(
            &work,
            Some("TA-*"),
            false,
            Arc::new(FakeDocker::new()),
            PACKAGE_IMAGE,
            appinspect(&SplunkbaseConfig::default()),
        )
        .unwrap();
        let ids: Vec<&str> = manager.apps().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["TA-web"]);
    }

    #[test]
    fn test_csv_export() {
        let (tmp, work) = workspace();
        let manager = manager(&work, Arc::new(FakeDocker::new()), false);
        let out = tmp.path().join("apps.csv");

        manager.write_csv(&out).unwrap();

        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "ID,Name,Version\nSA-alerts,Alerts,0.9.1\nTA-web,Web Add-on,1.2.0\n"
        );
    }

    #[test]
    fn test_missing_work_dir() {
        let tmp = TempDir::new().unwrap();
        let result = AppsManager::new(
            &tmp.path().join("nope"),
            None,
            false,
            Arc::new(FakeDocker::new()),
            PACKAGE_IMAGE,
            appinspect(&SplunkbaseConfig::default()),
        );
        assert!(matches!(result, Err(Error::PathNotFound(_))));
    }
}

mod packaging_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn packaging_docker() -> Arc<FakeDocker> {
        Arc::new(
            FakeDocker::new()
                .with_image(PACKAGE_IMAGE)
                .on_start("splunk_package", fake_packager),
        )
    }

    #[tokio::test]
    async fn test_validate_packages_every_app() {
        let (tmp, work) = workspace();
        let docker = packaging_docker();
        let manager = manager(&work, docker.clone(), false);

        let outcomes = manager
            .validate(false, Some(false), &AcceptDefaults)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        for outcome in &outcomes {
            let packaging = &outcome.packaging;
            assert!(packaging.built);
            assert_eq!(packaging.appinspect_log.as_deref(), Some("0 failures"));
            assert_eq!(packaging.packages.len(), 1);
            assert!(packaging.packages[0].1.starts_with("sha256:"));
            assert!(outcome.cloudvet_summary.is_none());
        }
        assert!(tmp.path().join("dist/TA-web/TA-web-1.0.0.tar.gz").exists());

        let created = docker.created();
        assert_eq!(created.len(), 2);
        assert!(created[0].environment.contains(&"APP_DIR=/apps".to_string()));
        assert!(created[0].environment.contains(&"PKG_DIR=/dist".to_string()));
        assert!(created[0].environment.iter().any(|e| e.starts_with("MYUSER=")));
        // The packaging container is removed after every run
        assert!(docker.container("splunk_package").is_none());
    }

    #[tokio::test]
    async fn test_existing_result_is_reused_without_force() {
        let (tmp, work) = workspace();
        let result = tmp.path().join("dist/TA-web");
        std::fs::create_dir_all(&result).unwrap();
        std::fs::write(result.join("TA-web-0.1.0.tar.gz"), b"old").unwrap();
        let docker = packaging_docker();
        let manager = manager(&work, docker.clone(), false);
        let app = manager
            .apps()
            .iter()
            .find(|a| a.id == "TA-web")
            .cloned()
            .unwrap();

        let reused = manager
            .run_packaging(&app, &manager.dist_dir(), false, &AcceptDefaults)
            .await
            .unwrap();
        assert!(!reused.built);
        assert!(docker.calls().is_empty());
        assert_eq!(reused.packages.len(), 1);

        let forced = manager
            .run_packaging(&app, &manager.dist_dir(), true, &AcceptDefaults)
            .await
            .unwrap();
        assert!(forced.built);
        assert_eq!(forced.packages.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_packaging_container_is_removed_first() {
        let (_tmp, work) = workspace();
        let docker = Arc::new(
            FakeDocker::new()
                .with_image(PACKAGE_IMAGE)
                .with_container("splunk_package", "exited")
                .on_start("splunk_package", fake_packager),
        );
        let manager = manager(&work, docker.clone(), false);
        let app = manager.apps()[0].clone();

        manager
            .run_packaging(&app, &manager.dist_dir(), true, &AcceptDefaults)
            .await
            .unwrap();

        let calls = docker.calls();
        let removed = calls.iter().position(|c| c.starts_with("remove")).unwrap();
        let created = calls.iter().position(|c| c == "create splunk_package").unwrap();
        assert!(removed < created, "{calls:?}");
    }

    #[tokio::test]
    async fn test_missing_image_is_not_pulled_non_interactively() {
        let (_tmp, work) = workspace();
        let docker = Arc::new(FakeDocker::new().with_pullable(PACKAGE_IMAGE));
        let manager = manager(&work, docker.clone(), false);

        let err = manager
            .validate(true, Some(false), &AcceptDefaults)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ImageNotFound(ref image) if image == PACKAGE_IMAGE));
        assert!(docker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_interactive_selection_and_pull() {
        let (_tmp, work) = workspace();
        let docker = Arc::new(
            FakeDocker::new()
                .with_pullable(PACKAGE_IMAGE)
                .on_start("splunk_package", fake_packager),
        );
        let manager = manager(&work, docker.clone(), true);
        let prompter = ScriptedPrompter::new([
            Answer::MultiSelect(vec![1]),
            Answer::Confirm(false),
            Answer::Confirm(true),
        ]);

        let outcomes = manager.validate(false, None, &prompter).await.unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].packaging.app, "TA-web");
        assert_eq!(docker.calls()[0], format!("pull {PACKAGE_IMAGE}"));
        assert_eq!(prompter.remaining(), 0);
    }
}

mod cloudvet_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn server() -> (MockServer, SplunkbaseConfig) {
        let server = MockServer::start().await;
        let config = SplunkbaseConfig {
            username: "sb-user".into(),
            password: "sb-pass".into(),
            auth_uri: format!("{}/login", server.uri()),
            appinspect_uri: format!("{}/v1/app", server.uri()),
            ..SplunkbaseConfig::default()
        };
        (server, config)
    }

    fn package(dist: &Path, app: &str) {
        std::fs::create_dir_all(dist.join(app)).unwrap();
        std::fs::write(dist.join(app).join(format!("{app}-1.0.0.tar.gz")), b"pkg").unwrap();
    }

    fn vetting_manager(work: &Path, config: &SplunkbaseConfig) -> AppsManager {
        AppsManager::new(
            work,
            None,
            false,
            Arc::new(FakeDocker::new()),
            PACKAGE_IMAGE,
            appinspect(config),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_cloudvetting_stores_reports() {
        let (server, config) = server().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .and(basic_auth("sb-user", "sb-pass"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"token": "tok"}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/app/validate"))
            .and(bearer_token("tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": "Validation request submitted.", "request_id": "req-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/app/validate/status/req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "PROCESSING"})))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/app/validate/status/req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "SUCCESS"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/app/report/req-1"))
            .and(header("content-type", "text/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>report</html>"))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/app/report/req-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"summary": {"failure": 0, "success": 12}, "reports": []})),
            )
            .mount(&server)
            .await;

        let (tmp, work) = workspace();
        let dist = tmp.path().join("dist");
        package(&dist, "TA-web");
        let manager = vetting_manager(&work, &config);

        let summary = manager
            .run_cloudvetting("TA-web", &dist, false, &AcceptDefaults)
            .await
            .unwrap();

        assert_eq!(summary, Some(json!({"failure": 0, "success": 12})));
        assert_eq!(
            std::fs::read_to_string(dist.join("TA-web_appinspect.html")).unwrap(),
            "<html>report</html>"
        );
        let stored: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dist.join("TA-web_appinspect.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(stored["summary"]["success"], 12);
    }

    #[tokio::test]
    async fn test_missing_package_skips_vetting() {
        let (server, config) = server().await;
        let (tmp, work) = workspace();
        let manager = vetting_manager(&work, &config);

        let summary = manager
            .run_cloudvetting("TA-web", &tmp.path().join("dist"), true, &AcceptDefaults)
            .await
            .unwrap();

        assert!(summary.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_report_is_kept_without_force() {
        let (server, config) = server().await;
        let (tmp, work) = workspace();
        let dist = tmp.path().join("dist");
        package(&dist, "TA-web");
        std::fs::write(dist.join("TA-web_appinspect.html"), "old").unwrap();
        let manager = vetting_manager(&work, &config);

        let summary = manager
            .run_cloudvetting("TA-web", &dist, false, &AcceptDefaults)
            .await
            .unwrap();

        assert!(summary.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submission_without_request_id_fails() {
        let (server, config) = server().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"token": "tok"}})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/app/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Invalid package"})))
            .mount(&server)
            .await;

        let (tmp, work) = workspace();
        let dist = tmp.path().join("dist");
        package(&dist, "TA-web");
        let manager = vetting_manager(&work, &config);

        let err = manager
            .run_cloudvetting("TA-web", &dist, true, &AcceptDefaults)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AppInspect(ref m) if m.contains("Invalid package")));
    }
}
