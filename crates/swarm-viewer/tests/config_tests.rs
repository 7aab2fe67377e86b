use swarm_common::{Config, ConfigError, ViewerConfig, WatchPolicy};

#[test]
fn test_empty_document_uses_defaults() {
    let config = Config::from_yaml("{}").unwrap();
    assert_eq!(config.viewer.base_url, "http://localhost:8080");
    assert_eq!(config.viewer.heartbeat_interval_ms, 5000);
    assert_eq!(config.viewer.heartbeat_timeout_ms, 2000);
    assert_eq!(config.viewer.chunk_size_bytes, 8192);
    assert_eq!(config.population.workers, 1);
    assert_eq!(config.population.stagger_ms, 50);
    assert!(!config.metrics.enabled);
    assert_eq!(
        config.viewer.watch,
        WatchPolicy::AlwaysStream {
            video: "sample.mp4".to_string()
        }
    );
}

#[test]
fn test_parse_probabilistic_policy() {
    let yaml = r#"
viewer:
  base_url: "http://stream.local:9000/"
  watch:
    policy: probabilistic
    probability: 0.25
population:
  workers: 40
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(
        config.viewer.watch,
        WatchPolicy::Probabilistic { probability: 0.25 }
    );
    assert_eq!(config.population.workers, 40);
    assert_eq!(config.viewer.iteration_sleep_ms, 1000);
}

#[test]
fn test_shipped_config_is_valid() {
    let data = include_str!("../../../config/swarm_config.yaml");
    let config = Config::from_yaml(data).unwrap();
    assert_eq!(config.viewer.error_cooldown_ms, 5000);
}

#[test]
fn test_endpoint_joins_paths() {
    let mut config = ViewerConfig::default();
    config.base_url = "http://x/".to_string();
    assert_eq!(config.endpoint("heartbeat"), "http://x/heartbeat");
    config.base_url = "http://x".to_string();
    assert_eq!(config.endpoint("/video/a.mp4"), "http://x/video/a.mp4");
}

#[test]
fn test_rejects_invalid_settings() {
    let cases = [
        "viewer: { base_url: \"ftp://x\" }",
        "viewer: { base_url: \"https://x\" }",
        "viewer: { heartbeat_interval_ms: 0 }",
        "viewer: { request_timeout_ms: 0 }",
        "viewer: { chunk_size_bytes: 1024 }",
        "viewer: { watch: { policy: probabilistic, probability: 1.5 } }",
        "viewer: { watch: { policy: always_stream, video: \"\" } }",
    ];
    for yaml in cases {
        match Config::from_yaml(yaml) {
            Err(ConfigError::Invalid(_)) => {}
            other => panic!("expected invalid config for {}, got {:?}", yaml, other),
        }
    }
}

#[test]
fn test_rejects_unknown_policy() {
    let yaml = "viewer: { watch: { policy: binge } }";
    assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::Parse(_))));
}
