// tests/registry_store.rs
//
// ConfigRegistry against real files: seeded defaults, persistence across
// instances, rejected commands leave the document untouched.

use slothus_seeker::config::RegistryDefaults;
use slothus_seeker::{Category, ConfigError, ConfigRegistry};

fn read_doc(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn first_access_seeds_global_defaults_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let registry = ConfigRegistry::with_defaults(
        &path,
        RegistryDefaults {
            interval_hours: 4.0,
            start_window_days: 3,
        },
    );

    let global = registry.global().await.unwrap();
    assert_eq!(global.scrape_interval_hours, 4.0);
    let expected = chrono::Utc::now().timestamp() - 3 * 86_400;
    assert!((global.scrape_start_timestamp - expected).abs() < 60);

    let doc = read_doc(&path);
    assert_eq!(doc["global"]["scrape_interval_hours"], 4.0);
}

#[tokio::test]
async fn destinations_survive_a_new_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let registry = ConfigRegistry::new(&path);
    registry
        .set_destination("123", Category::Summer, "https://discord.com/api/webhooks/1/a")
        .await
        .unwrap();
    registry
        .set_destination("456", Category::Summer, "https://hooks.slack.com/services/T/B/c")
        .await
        .unwrap();
    registry
        .set_destination("456", Category::Offseason, "https://discord.com/api/webhooks/2/b")
        .await
        .unwrap();
    registry.set_interval(2.5).await.unwrap();

    let reopened = ConfigRegistry::new(&path);
    let mut summer = reopened.all_destinations(Category::Summer).await.unwrap();
    summer.sort();
    assert_eq!(
        summer,
        vec![
            "https://discord.com/api/webhooks/1/a".to_string(),
            "https://hooks.slack.com/services/T/B/c".to_string(),
        ]
    );
    assert_eq!(
        reopened.all_destinations(Category::Offseason).await.unwrap(),
        vec!["https://discord.com/api/webhooks/2/b".to_string()]
    );
    assert_eq!(reopened.global().await.unwrap().scrape_interval_hours, 2.5);

    let view = reopened.view("456").await.unwrap();
    assert_eq!(view.group.destination(Category::Summer), Some("https://hooks.slack.com/services/T/B/c"));
}

#[tokio::test]
async fn rejected_commands_leave_the_document_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let registry = ConfigRegistry::new(&path);
    registry
        .set_destination("g", Category::Summer, "https://discord.com/api/webhooks/1/a")
        .await
        .unwrap();
    let before = read_doc(&path);

    for hours in [0.0, 0.49, 168.5, f64::NAN] {
        assert!(matches!(
            registry.set_interval(hours).await,
            Err(ConfigError::Validation(_))
        ));
    }
    for days in [0, 366] {
        assert!(matches!(
            registry.set_start_window(days).await,
            Err(ConfigError::Validation(_))
        ));
    }
    assert!(registry.set_start_timestamp(0).await.is_err());
    assert!(registry
        .set_destination("g", Category::Summer, "ftp://nope")
        .await
        .is_err());
    assert!(registry
        .set_destination("global", Category::Summer, "https://discord.com/api/webhooks/1/a")
        .await
        .is_err());

    assert_eq!(read_doc(&path), before);
}

#[tokio::test]
async fn unknown_group_reads_as_unsubscribed() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ConfigRegistry::new(dir.path().join("config.json"));

    let g = registry.group_config("never-seen").await;
    assert_eq!(g.destination(Category::Summer), None);
    assert_eq!(g.destination(Category::Offseason), None);
    assert!(!registry.snapshot().await.unwrap().has_any_destination());
}

#[tokio::test]
async fn reserved_or_blank_group_id_reads_empty_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let registry = ConfigRegistry::new(&path);
    registry.set_interval(4.0).await.unwrap();
    let before = read_doc(&path);

    for id in ["global", "", "   "] {
        assert_eq!(registry.group_config(id).await, Default::default());
    }

    assert_eq!(read_doc(&path), before);
    // The global section is still readable and unchanged.
    let global = registry.global().await.unwrap();
    assert_eq!(global.scrape_interval_hours, 4.0);
    assert_eq!(ConfigRegistry::new(&path).global().await.unwrap(), global);
}

#[tokio::test]
async fn corrupt_document_is_an_error_not_a_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ this is not json").unwrap();
    let registry = ConfigRegistry::new(&path);

    assert!(registry.snapshot().await.is_err());
    // group_config degrades to an empty config instead of failing.
    assert_eq!(registry.group_config("g").await, Default::default());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ this is not json");
}
