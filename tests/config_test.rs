//! Unit tests for configuration parsing
//!
//! Covers YAML loading, defaults, validation, and protocol trimming.

use enclave_mirror::config::{
    trim_protocol, MirrorConfig, LIMIT_OVERALL_PARALLEL_DOWNLOADS, MAX_PARALLEL_LAYER_DOWNLOADS,
};

#[test]
fn test_config_defaults() {
    let config = MirrorConfig::from_yaml("localStorageFQDN: localhost:55000\n").unwrap();
    assert_eq!(config.local_storage_fqdn, "localhost:55000");
    assert_eq!(config.max_parallel_layer_downloads, MAX_PARALLEL_LAYER_DOWNLOADS);
    assert_eq!(
        config.limit_overall_parallel_downloads,
        LIMIT_OVERALL_PARALLEL_DOWNLOADS
    );
    assert_eq!(config.max_parallel_layer_downloads, 10);
    assert_eq!(config.limit_overall_parallel_downloads, 200);
    assert!(config.remove_signatures);
    assert!(!config.source_skip_tls);
    assert!(config.operators.is_empty());
}

#[test]
fn test_config_catalog_entries() {
    let yaml = r#"
localStorageFQDN: localhost:55000
operators:
  - catalog: registry.redhat.io/redhat/redhat-operator-index:v4.15
    targetCatalogSourceTemplate: /tmp/template.yaml
    packages:
      - name: cockroachdb
        minVersion: 5.0.0
        maxVersion: 6.0.0
      - name: node-observ
"#;
    let config = MirrorConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.operators.len(), 1);
    let operator = &config.operators[0];
    assert_eq!(
        operator.catalog,
        "registry.redhat.io/redhat/redhat-operator-index:v4.15"
    );
    assert_eq!(
        operator.target_catalog_source_template.as_deref(),
        Some("/tmp/template.yaml")
    );
    assert_eq!(operator.packages.len(), 2);
    assert_eq!(operator.packages[0].min_version.as_deref(), Some("5.0.0"));
    assert_eq!(operator.packages[0].max_version.as_deref(), Some("6.0.0"));
    assert!(operator.packages[1].min_version.is_none());
}

#[test]
fn test_config_validation() {
    assert!(MirrorConfig::from_yaml("maxParallelLayerDownloads: 0\n").is_err());
    // overall limit may not undercut the per-image fan-out
    assert!(MirrorConfig::from_yaml(
        "maxParallelLayerDownloads: 10\nlimitOverallParallelDownloads: 4\n"
    )
    .is_err());
    assert!(MirrorConfig::from_yaml("operators:\n  - catalog: \"\"\n").is_err());
    assert!(MirrorConfig::from_yaml("{not valid yaml").is_err());
}

#[test]
fn test_trim_protocol() {
    assert_eq!(trim_protocol("docker://quay.io/ns/repo:v1"), "quay.io/ns/repo:v1");
    assert_eq!(trim_protocol("oci:///tmp/catalog"), "/tmp/catalog");
    assert_eq!(trim_protocol("oci:/tmp/catalog"), "/tmp/catalog");
    assert_eq!(trim_protocol("file://heads/app"), "heads/app");
    assert_eq!(trim_protocol("dir://staging"), "staging");
    assert_eq!(trim_protocol("quay.io/ns/repo"), "quay.io/ns/repo");
}
