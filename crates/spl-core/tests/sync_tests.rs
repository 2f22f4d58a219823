//! Tests for object synchronization between two instances

use std::sync::Arc;

use serde_json::json;
use spl_core::config::SyncConfig;
use spl_core::sync::StanzaStatus;
use spl_core::{AcceptDefaults, ConnectionAdapter, ObjectKind, SyncEngine, SyncOptions};
use spl_test_utils::{Answer, Call, MemoryService, ScriptedPrompter, entity};

const ROLES: &str = "authorization/roles";
const INDEXES: &str = "data/indexes";
const USERS: &str = "authentication/users";

fn adapter(name: &str, service: &Arc<MemoryService>) -> ConnectionAdapter {
    ConnectionAdapter::from_service(name, service.clone(), false)
}

fn all_passes() -> SyncOptions {
    SyncOptions {
        create: true,
        update: true,
        delete: true,
        simulate: false,
    }
}

fn mutations(service: &MemoryService) -> Vec<Call> {
    service
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, Call::Search(_)))
        .collect()
}

mod create_tests {
    use super::*;

    fn role_instances() -> (Arc<MemoryService>, Arc<MemoryService>) {
        let src = MemoryService::new("https://src:8089")
            .with_capabilities(&["search", "schedule_search"])
            .with_entities(
                ROLES,
                vec![
                    entity(
                        "power",
                        json!({
                            "capabilities": ["search", "schedule_search"],
                            "imported_roles": ["user", "analyst"],
                            "defaultApp": "search",
                            "imported_capabilities": ["x"]
                        }),
                    ),
                    entity("user", json!({"capabilities": ["search"]})),
                ],
            );
        let dest = MemoryService::new("https://dest:8089")
            .with_capabilities(&["search"])
            .with_entities(ROLES, vec![entity("user", json!({"capabilities": ["search"]}))])
            .with_entities("apps/local", vec![entity("search", json!({}))]);
        (Arc::new(src), Arc::new(dest))
    }

    #[tokio::test]
    async fn test_create_drops_unknown_references() {
        let (src, dest) = role_instances();
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let options = SyncOptions {
            create: true,
            ..SyncOptions::default()
        };
        let report = engine.sync(ObjectKind::Roles, options).await.unwrap();

        assert!(report.success);
        assert_eq!(report.actions, vec!["Created Role 'power' on dest"]);
        let Some(Call::Create { endpoint, name, args }) = dest.calls().into_iter().next() else {
            panic!("expected a create call");
        };
        assert_eq!(endpoint, ROLES);
        assert_eq!(name, "power");
        assert_eq!(args["capabilities"], json!(["search"]));
        assert_eq!(args["imported_roles"], json!(["user"]));
        assert_eq!(args["defaultApp"], json!("search"));
        assert!(!args.contains_key("imported_capabilities"));
    }

    #[tokio::test]
    async fn test_created_users_get_the_default_password() {
        let src = Arc::new(MemoryService::new("https://src:8089").with_entities(
            USERS,
            vec![entity(
                "alice",
                json!({"email": "alice@example.com", "roles": ["user"], "type": "Splunk"}),
            )],
        ));
        let dest = Arc::new(
            MemoryService::new("https://dest:8089")
                .with_entities(ROLES, vec![entity("user", json!({}))]),
        );
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let config = SyncConfig {
            default_user_password: "Ch4ngeMe!".into(),
        };
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &config);

        engine
            .sync(ObjectKind::Users, all_passes())
            .await
            .unwrap();

        let created = dest.entities(USERS);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].get("password"), Some(&json!("Ch4ngeMe!")));
        assert_eq!(created[0].get("roles"), Some(&json!(["user"])));
        assert_eq!(created[0].get("type"), None);
    }

    #[tokio::test]
    async fn test_interactive_create_respects_selection() {
        let (src, dest) = role_instances();
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let prompter = ScriptedPrompter::new([Answer::MultiSelect(vec![])]);
        let engine = SyncEngine::new(&a, &b, &prompter, true, &SyncConfig::default());

        let options = SyncOptions {
            create: true,
            ..SyncOptions::default()
        };
        let report = engine.sync(ObjectKind::Roles, options).await.unwrap();

        assert!(report.actions.is_empty());
        assert!(mutations(&dest).is_empty());
        assert_eq!(prompter.asked(), vec!["Select the Role you want to create:"]);
    }

    #[tokio::test]
    async fn test_simulated_create_writes_nothing() {
        let (src, dest) = role_instances();
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let options = SyncOptions {
            simulate: true,
            ..all_passes()
        };
        let report = engine.sync(ObjectKind::Roles, options).await.unwrap();

        assert!(mutations(&dest).is_empty());
        assert!(
            report
                .skipped
                .contains(&"Simulated Role creation of 'power'".to_string())
        );
    }
}

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_changed_property_is_updated() {
        let src = Arc::new(MemoryService::new("https://src:8089").with_entities(
            INDEXES,
            vec![entity("main", json!({"maxTotalDataSizeMB": "500000"}))],
        ));
        let dest = Arc::new(MemoryService::new("https://dest:8089").with_entities(
            INDEXES,
            vec![entity("main", json!({"maxTotalDataSizeMB": "100"}))],
        ));
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let report = engine.sync(ObjectKind::Indexes, all_passes()).await.unwrap();

        assert_eq!(report.actions.len(), 1);
        assert_eq!(
            dest.entities(INDEXES)[0].get("maxTotalDataSizeMB"),
            Some(&json!("500000"))
        );
        let (_, _, diff) = engine.diff(ObjectKind::Indexes).await.unwrap();
        assert!(diff.is_empty());
    }

    #[tokio::test]
    async fn test_list_items_are_added_and_removed() {
        let src = Arc::new(MemoryService::new("https://src:8089").with_entities(
            ROLES,
            vec![
                entity("power", json!({"imported_roles": ["user", "can_delete"]})),
                entity("user", json!({})),
                entity("can_delete", json!({})),
            ],
        ));
        let dest = Arc::new(MemoryService::new("https://dest:8089").with_entities(
            ROLES,
            vec![
                entity("power", json!({"imported_roles": ["user", "admin"]})),
                entity("user", json!({})),
                entity("can_delete", json!({})),
                entity("admin", json!({})),
            ],
        ));
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let options = SyncOptions {
            update: true,
            ..SyncOptions::default()
        };
        let report = engine.sync(ObjectKind::Roles, options).await.unwrap();

        assert!(report.success, "{:?}", report.errors);
        let power = dest
            .entities(ROLES)
            .into_iter()
            .find(|e| e.name == "power")
            .unwrap();
        let mut roles = power.list("imported_roles");
        roles.sort();
        assert_eq!(roles, vec!["can_delete", "user"]);
    }

    #[tokio::test]
    async fn test_property_absent_on_destination_is_ignored() {
        let src = Arc::new(MemoryService::new("https://src:8089").with_entities(
            INDEXES,
            vec![entity("main", json!({"frozenTimePeriodInSecs": "100", "homePath": "a"}))],
        ));
        let dest = Arc::new(
            MemoryService::new("https://dest:8089")
                .with_entities(INDEXES, vec![entity("main", json!({"homePath": "a"}))]),
        );
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let report = engine.sync(ObjectKind::Indexes, all_passes()).await.unwrap();

        assert!(report.actions.is_empty());
        assert!(report.skipped.iter().any(|s| s.starts_with("Ignored")));
        assert!(mutations(&dest).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_default_app_is_not_assigned() {
        let src = Arc::new(MemoryService::new("https://src:8089").with_entities(
            ROLES,
            vec![entity("power", json!({"defaultApp": "missing_app"}))],
        ));
        let dest = Arc::new(
            MemoryService::new("https://dest:8089")
                .with_entities(ROLES, vec![entity("power", json!({"defaultApp": "search"}))])
                .with_entities("apps/local", vec![entity("search", json!({}))]),
        );
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let report = engine.sync(ObjectKind::Roles, all_passes()).await.unwrap();

        assert!(mutations(&dest).is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].starts_with("Unresolvable"));
    }

    #[tokio::test]
    async fn test_interactive_update_is_declined_by_default() {
        let src = Arc::new(MemoryService::new("https://src:8089").with_entities(
            INDEXES,
            vec![entity("main", json!({"maxTotalDataSizeMB": "500000"}))],
        ));
        let dest = Arc::new(MemoryService::new("https://dest:8089").with_entities(
            INDEXES,
            vec![entity("main", json!({"maxTotalDataSizeMB": "100"}))],
        ));
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let prompter = ScriptedPrompter::default();
        let engine = SyncEngine::new(&a, &b, &prompter, true, &SyncConfig::default());

        let options = SyncOptions {
            update: true,
            ..SyncOptions::default()
        };
        let report = engine.sync(ObjectKind::Indexes, options).await.unwrap();

        assert!(mutations(&dest).is_empty());
        assert_eq!(
            prompter.asked(),
            vec![
                "Do you want to update Index 'main' prop named 'maxTotalDataSizeMB' from '100' to '500000'?"
            ]
        );
        assert!(report.skipped[0].starts_with("Declined"));
    }
}

mod delete_tests {
    use super::*;

    fn instances() -> (Arc<MemoryService>, Arc<MemoryService>) {
        let src = MemoryService::new("https://src:8089")
            .with_entities(INDEXES, vec![entity("main", json!({}))]);
        let dest = MemoryService::new("https://dest:8089").with_entities(
            INDEXES,
            vec![entity("main", json!({})), entity("old_index", json!({}))],
        );
        (Arc::new(src), Arc::new(dest))
    }

    #[tokio::test]
    async fn test_extra_entities_are_deleted() {
        let (src, dest) = instances();
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let options = SyncOptions {
            delete: true,
            ..SyncOptions::default()
        };
        let report = engine.sync(ObjectKind::Indexes, options).await.unwrap();

        assert_eq!(
            mutations(&dest),
            vec![Call::Delete {
                endpoint: INDEXES.into(),
                name: "old_index".into()
            }]
        );
        assert_eq!(report.actions, vec!["Deleted Index 'old_index' on dest"]);
    }

    #[tokio::test]
    async fn test_interactive_delete_needs_confirmation() {
        let (src, dest) = instances();
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let prompter = ScriptedPrompter::new([Answer::MultiSelect(vec![0]), Answer::Default]);
        let engine = SyncEngine::new(&a, &b, &prompter, true, &SyncConfig::default());

        let options = SyncOptions {
            delete: true,
            ..SyncOptions::default()
        };
        let report = engine.sync(ObjectKind::Indexes, options).await.unwrap();

        assert!(mutations(&dest).is_empty());
        assert_eq!(report.skipped, vec!["Declined Index deletion of 'old_index'"]);
        assert_eq!(prompter.remaining(), 0);
    }

    #[tokio::test]
    async fn test_simulated_delete() {
        let (src, dest) = instances();
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let options = SyncOptions {
            delete: true,
            simulate: true,
            ..SyncOptions::default()
        };
        let report = engine.sync(ObjectKind::Indexes, options).await.unwrap();

        assert!(mutations(&dest).is_empty());
        assert_eq!(report.skipped, vec!["Simulated Index deletion of 'old_index'"]);
    }
}

mod remote_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_create_is_reported_and_run_continues() {
        let src = Arc::new(MemoryService::new("https://src:8089").with_entities(
            INDEXES,
            vec![entity("audit", json!({})), entity("web", json!({}))],
        ));
        let dest = Arc::new(
            MemoryService::new("https://dest:8089")
                .with_entities(INDEXES, vec![])
                .with_failing_write(INDEXES, "audit"),
        );
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let options = SyncOptions {
            create: true,
            ..SyncOptions::default()
        };
        let report = engine.sync(ObjectKind::Indexes, options).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("'audit'"), "got {:?}", report.errors);
        assert_eq!(report.actions, vec!["Created Index 'web' on dest"]);
        let names: Vec<String> = dest.entities(INDEXES).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["web"]);
    }

    #[tokio::test]
    async fn test_failed_delete_is_reported() {
        let src = Arc::new(MemoryService::new("https://src:8089").with_entities(INDEXES, vec![]));
        let dest = Arc::new(
            MemoryService::new("https://dest:8089")
                .with_entities(
                    INDEXES,
                    vec![entity("locked", json!({})), entity("old_index", json!({}))],
                )
                .with_failing_write(INDEXES, "locked"),
        );
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let options = SyncOptions {
            delete: true,
            ..SyncOptions::default()
        };
        let report = engine.sync(ObjectKind::Indexes, options).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.actions, vec!["Deleted Index 'old_index' on dest"]);
    }
}

mod conf_tests {
    use super::*;

    #[tokio::test]
    async fn test_conf_stanzas_are_classified() {
        let endpoint = "configs/conf-props";
        let src = Arc::new(MemoryService::new("https://src:8089").with_entities(
            endpoint,
            vec![
                entity("access_combined", json!({"SHOULD_LINEMERGE": "false"})),
                entity("syslog", json!({"TIME_FORMAT": "%b %d %H:%M:%S"})),
                entity("custom:json", json!({"KV_MODE": "json"})),
            ],
        ));
        let dest = Arc::new(MemoryService::new("https://dest:8089").with_entities(
            endpoint,
            vec![
                entity("access_combined", json!({"SHOULD_LINEMERGE": "false"})),
                entity("syslog", json!({"TIME_FORMAT": "%Y-%m-%d"})),
            ],
        ));
        let (a, b) = (adapter("src", &src), adapter("dest", &dest));
        let engine = SyncEngine::new(&a, &b, &AcceptDefaults, false, &SyncConfig::default());

        let report = engine.conf_stanzas("props").await.unwrap();

        assert_eq!(report.count(StanzaStatus::Identical), 1);
        assert_eq!(report.count(StanzaStatus::Differs), 1);
        assert_eq!(report.count(StanzaStatus::Missing), 1);
        let syslog = report.stanzas.iter().find(|s| s.name == "syslog").unwrap();
        let diff = syslog.diff.as_deref().unwrap();
        assert!(diff.contains("-TIME_FORMAT = %Y-%m-%d"));
        assert!(diff.contains("+TIME_FORMAT = %b %d %H:%M:%S"));
    }
}
