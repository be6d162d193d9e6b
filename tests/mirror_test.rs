//! Unit tests for mirror rule derivation
//!
//! Table-driven cases covering both generator modes, repository scope,
//! cache-destined records, and the prefix-folding invariants.

use std::collections::BTreeMap;

use enclave_mirror::mirror::{
    generate_image_mirrors, CopyRecord, GeneratorMode, ImageCategory, MirrorCategory,
};

const LOCAL_STORAGE_FQDN: &str = "localhost:55000";

fn record(source: &str, destination: &str, origin: &str, category: ImageCategory) -> CopyRecord {
    CopyRecord {
        source: source.to_string(),
        destination: destination.to_string(),
        origin: origin.to_string(),
        category,
    }
}

fn mixed_image_list() -> Vec<CopyRecord> {
    vec![
        record(
            "docker://localhost:5000/kubebuilder/kube-rbac-proxy:v0.5.0",
            "docker://myregistry/mynamespace/kubebuilder/kube-rbac-proxy:v0.5.0",
            "docker://gcr.io/kubebuilder/kube-rbac-proxy:v0.5.0",
            ImageCategory::OperatorRelatedImage,
        ),
        record(
            "docker://localhost:5000/cockroachdb/cockroach-helm-operator:6.0.0",
            "docker://myregistry/mynamespace/cockroachdb/cockroach-helm-operator:6.0.0",
            "docker://quay.io/cockroachdb/cockroach-helm-operator:6.0.0",
            ImageCategory::OperatorRelatedImage,
        ),
        record(
            "docker://localhost:5000/helmoperators/cockroachdb:v5.0.3",
            "docker://myregistry/mynamespace/helmoperators/cockroachdb:v5.0.3",
            "docker://quay.io/helmoperators/cockroachdb:v5.0.3",
            ImageCategory::OperatorRelatedImage,
        ),
        record(
            "docker://localhost:5000/helmoperators/cockroachdb:v5.0.4",
            "docker://myregistry/mynamespace/helmoperators/cockroachdb:v5.0.4",
            "docker://quay.io/helmoperators/cockroachdb:v5.0.4",
            ImageCategory::OperatorRelatedImage,
        ),
        record(
            "docker://localhost:5000/openshift-community-operators/cockroachdb@sha256:a5d4f4467250074216eb1ba1c36e06a3ab797d81c431427fc2aca97ecaf4e9d8",
            "docker://myregistry/mynamespace/openshift-community-operators/cockroachdb@sha256:a5d4f4467250074216eb1ba1c36e06a3ab797d81c431427fc2aca97ecaf4e9d8",
            "docker://quay.io/openshift-community-operators/cockroachdb@sha256:a5d4f4467250074216eb1ba1c36e06a3ab797d81c431427fc2aca97ecaf4e9d8",
            ImageCategory::OperatorBundle,
        ),
        record(
            "docker://localhost:5000/openshift-community-operators/cockroachdb@sha256:d3016b1507515fc7712f9c47fd9082baf9ccb070aaab58ed0ef6e5abdedde8ba",
            "docker://myregistry/mynamespace/openshift-community-operators/cockroachdb@sha256:d3016b1507515fc7712f9c47fd9082baf9ccb070aaab58ed0ef6e5abdedde8ba",
            "docker://quay.io/openshift-community-operators/cockroachdb@sha256:d3016b1507515fc7712f9c47fd9082baf9ccb070aaab58ed0ef6e5abdedde8ba",
            ImageCategory::OperatorBundle,
        ),
        record(
            "docker://localhost:5000/openshift/openshift-community-operators@sha256:f42337e7b85a46d83c94694638e2312e10ca16a03542399a65ba783c94a32b63",
            "docker://myregistry/mynamespace/openshift/openshift-community-operators@sha256:f42337e7b85a46d83c94694638e2312e10ca16a03542399a65ba783c94a32b63",
            "docker://quay.io/openshift/openshift-community-operators@sha256:f42337e7b85a46d83c94694638e2312e10ca16a03542399a65ba783c94a32b63",
            ImageCategory::OperatorCatalog,
        ),
        record(
            "docker://localhost:5000/openshift/redhat-operator-index@sha256:f42337e7b85a46d83c94694638e2312e10ca16a03542399a65ba783c94a32b63",
            "docker://myregistry/mynamespace/openshift/redhat-operator-index@sha256:f42337e7b85a46d83c94694638e2312e10ca16a03542399a65ba783c94a32b63",
            "oci:///tmp/app1",
            ImageCategory::OperatorCatalog,
        ),
        record(
            "docker://localhost:55000/ubi8-minimal:b93deceb59a58588d5b16429fc47f98920f84740a1f2ed6454e33275f0701b59",
            "docker://myregistry/mynamespace/ubi8-minimal@sha256:b93deceb59a58588d5b16429fc47f98920f84740a1f2ed6454e33275f0701b59",
            "docker://registry.redhat.io/ubi8-minimal@sha256:b93deceb59a58588d5b16429fc47f98920f84740a1f2ed6454e33275f0701b59",
            ImageCategory::OperatorRelatedImage,
        ),
        record(
            "docker://localhost:5000/ubi8/ubi:latest",
            "docker://myregistry/mynamespace/ubi8/ubi:latest",
            "docker://registry.redhat.io/ubi8/ubi:latest",
            ImageCategory::Generic,
        ),
        record(
            "docker://localhost:5000/openshift/graph-image:latest",
            "docker://myregistry/mynamespace/openshift/graph-image:latest",
            "docker://localhost:5000/openshift/graph-image:latest",
            ImageCategory::CincinnatiGraph,
        ),
        record(
            "docker://localhost:5000/openshift-release-dev/ocp-v4.0-art-dev@sha256:6d76ffca7a233213325907bae611e835b49c5b933095be1328351f4f5fc67615",
            "docker://myregistry/mynamespace/openshift-release-dev/ocp-v4.0-art-dev@sha256:6d76ffca7a233213325907bae611e835b49c5b933095be1328351f4f5fc67615",
            "docker://quay.io/openshift-release-dev/ocp-v4.0-art-dev@sha256:6d76ffca7a233213325907bae611e835b49c5b933095be1328351f4f5fc67615",
            ImageCategory::OcpRelease,
        ),
        record(
            "docker://localhost:5000/openshift-release-dev/ocp-v4.0-art-dev@sha256:4c181f5cbea53472acd9695232f77a0933a73f7f40f543cbd48dff00e6f03090",
            "docker://myregistry/mynamespace/openshift-release-dev/ocp-v4.0-art-dev@sha256:4c181f5cbea53472acd9695232f77a0933a73f7f40f543cbd48dff00e6f03090",
            "docker://quay.io/openshift-release-dev/ocp-v4.0-art-dev@sha256:4c181f5cbea53472acd9695232f77a0933a73f7f40f543cbd48dff00e6f03090",
            ImageCategory::OcpReleaseContent,
        ),
    ]
}

fn digests_only_image_list() -> Vec<CopyRecord> {
    let digests = [
        "7c4ef7434c97c8aaf6cd310874790b915b3c61fc902eea255f9177058ea9aff3",
        "6d76ffca7a233213325907bae611e835b49c5b933095be1328351f4f5fc67615",
        "4c181f5cbea53472acd9695232f77a0933a73f7f40f543cbd48dff00e6f03090",
        "ff8ef167b679606b17baf75d94a02589048849b550c4cc17d36506a28f22b29c",
    ];
    digests
        .iter()
        .map(|digest| {
            record(
                &format!(
                    "docker://localhost:5000/openshift-release-dev/ocp-v4.0-art-dev@sha256:{}",
                    digest
                ),
                &format!(
                    "docker://myregistry/mynamespace/openshift-release-dev/ocp-v4.0-art-dev@sha256:{}",
                    digest
                ),
                &format!(
                    "docker://quay.io/openshift-release-dev/ocp-v4.0-art-dev@sha256:{}",
                    digest
                ),
                ImageCategory::OcpReleaseContent,
            )
        })
        .collect()
}

fn mirrors_map(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(source, mirrors)| {
            (
                source.to_string(),
                mirrors.iter().map(|m| m.to_string()).collect(),
            )
        })
        .collect()
}

#[test]
fn test_digests_only_mode() {
    let mirrors = generate_image_mirrors(
        &digests_only_image_list(),
        GeneratorMode::DigestsOnly,
        false,
        LOCAL_STORAGE_FQDN,
    )
    .unwrap();

    assert_eq!(mirrors.len(), 1);
    assert_eq!(mirrors[0].category, MirrorCategory::Release);
    assert_eq!(
        mirrors[0].mirrors,
        mirrors_map(&[(
            "quay.io/openshift-release-dev",
            &["myregistry/mynamespace/openshift-release-dev"],
        )])
    );
}

#[test]
fn test_digests_only_input_yields_no_tag_mirrors() {
    let mirrors = generate_image_mirrors(
        &digests_only_image_list(),
        GeneratorMode::TagsOnly,
        false,
        LOCAL_STORAGE_FQDN,
    )
    .unwrap();
    assert!(mirrors.is_empty());
}

#[test]
fn test_tags_only_mode_mixed_content() {
    let mirrors = generate_image_mirrors(
        &mixed_image_list(),
        GeneratorMode::TagsOnly,
        false,
        LOCAL_STORAGE_FQDN,
    )
    .unwrap();

    assert_eq!(mirrors.len(), 2);
    assert_eq!(mirrors[0].category, MirrorCategory::Operator);
    assert_eq!(
        mirrors[0].mirrors,
        mirrors_map(&[
            ("gcr.io/kubebuilder", &["myregistry/mynamespace/kubebuilder"]),
            ("quay.io/cockroachdb", &["myregistry/mynamespace/cockroachdb"]),
            ("quay.io/helmoperators", &["myregistry/mynamespace/helmoperators"]),
        ])
    );
    assert_eq!(mirrors[1].category, MirrorCategory::Generic);
    assert_eq!(
        mirrors[1].mirrors,
        mirrors_map(&[("registry.redhat.io/ubi8", &["myregistry/mynamespace/ubi8"])])
    );
}

#[test]
fn test_digests_only_mode_mixed_content() {
    let mirrors = generate_image_mirrors(
        &mixed_image_list(),
        GeneratorMode::DigestsOnly,
        false,
        LOCAL_STORAGE_FQDN,
    )
    .unwrap();

    assert_eq!(mirrors.len(), 2);
    assert_eq!(mirrors[0].category, MirrorCategory::Operator);
    assert_eq!(
        mirrors[0].mirrors,
        mirrors_map(&[
            (
                "quay.io/openshift-community-operators",
                &["myregistry/mynamespace/openshift-community-operators"],
            ),
            ("registry.redhat.io", &["myregistry/mynamespace"]),
        ])
    );
    assert_eq!(mirrors[1].category, MirrorCategory::Release);
    assert_eq!(
        mirrors[1].mirrors,
        mirrors_map(&[(
            "quay.io/openshift-release-dev",
            &["myregistry/mynamespace/openshift-release-dev"],
        )])
    );
}

#[test]
fn test_digests_only_repository_scope() {
    let mirrors = generate_image_mirrors(
        &mixed_image_list(),
        GeneratorMode::DigestsOnly,
        true,
        LOCAL_STORAGE_FQDN,
    )
    .unwrap();

    assert_eq!(mirrors.len(), 2);
    assert_eq!(mirrors[0].category, MirrorCategory::Operator);
    assert_eq!(
        mirrors[0].mirrors,
        mirrors_map(&[
            (
                "quay.io/openshift-community-operators/cockroachdb",
                &["myregistry/mynamespace/openshift-community-operators/cockroachdb"],
            ),
            (
                "registry.redhat.io/ubi8-minimal",
                &["myregistry/mynamespace/ubi8-minimal"],
            ),
        ])
    );
    assert_eq!(mirrors[1].category, MirrorCategory::Release);
    assert_eq!(
        mirrors[1].mirrors,
        mirrors_map(&[(
            "quay.io/openshift-release-dev/ocp-v4.0-art-dev",
            &["myregistry/mynamespace/openshift-release-dev/ocp-v4.0-art-dev"],
        )])
    );
}

#[test]
fn test_tags_only_repository_scope_flattened_paths() {
    let records = vec![record(
        "docker://localhost:5000/cockroachdb/cockroach-helm-operator:6.0.0",
        "docker://myregistry/mynamespace/cockroachdb-cockroach-helm-operator:6.0.0",
        "docker://quay.io/cockroachdb/cockroach-helm-operator:6.0.0",
        ImageCategory::OperatorRelatedImage,
    )];
    let mirrors =
        generate_image_mirrors(&records, GeneratorMode::TagsOnly, true, LOCAL_STORAGE_FQDN)
            .unwrap();

    assert_eq!(mirrors.len(), 1);
    assert_eq!(
        mirrors[0].mirrors,
        mirrors_map(&[(
            "quay.io/cockroachdb/cockroach-helm-operator",
            &["myregistry/mynamespace/cockroachdb-cockroach-helm-operator"],
        )])
    );
}

#[test]
fn test_cache_destined_record_is_skipped() {
    let records = vec![record(
        "docker://localhost:5000/redhat/redhat-operator-index:v4.15",
        "docker://localhost:55000/redhat/redhat-operator-index:v4.15",
        "docker://registry.redhat.io/redhat/redhat-operator-index:v4.15",
        ImageCategory::OperatorRelatedImage,
    )];
    let mirrors =
        generate_image_mirrors(&records, GeneratorMode::TagsOnly, false, LOCAL_STORAGE_FQDN)
            .unwrap();
    assert!(mirrors.is_empty());
}

#[test]
fn test_prefix_rules_are_folded() {
    let records = vec![
        record(
            "docker://localhost:5000/ns/sub/app:v1",
            "docker://myregistry/mirror/ns/sub/app:v1",
            "docker://quay.io/ns/sub/app:v1",
            ImageCategory::Generic,
        ),
        record(
            "docker://localhost:5000/ns/other:v1",
            "docker://myregistry/mirror/ns/other:v1",
            "docker://quay.io/ns/other:v1",
            ImageCategory::Generic,
        ),
    ];
    let mirrors =
        generate_image_mirrors(&records, GeneratorMode::TagsOnly, false, LOCAL_STORAGE_FQDN)
            .unwrap();

    // quay.io/ns covers quay.io/ns/sub with the same /sub suffix on the
    // mirror side, so only the shorter rule survives
    assert_eq!(mirrors.len(), 1);
    assert_eq!(
        mirrors[0].mirrors,
        mirrors_map(&[("quay.io/ns", &["myregistry/mirror/ns"])])
    );
}

#[test]
fn test_no_key_is_a_strict_prefix_of_another() {
    for mode in [GeneratorMode::DigestsOnly, GeneratorMode::TagsOnly] {
        let mirrors =
            generate_image_mirrors(&mixed_image_list(), mode, false, LOCAL_STORAGE_FQDN).unwrap();
        for bucket in &mirrors {
            let keys: Vec<&String> = bucket.mirrors.keys().collect();
            for a in &keys {
                assert!(!a.ends_with('/'));
                for b in &keys {
                    if a != b {
                        let covered = b.strip_prefix(a.as_str()).is_some_and(|suffix| {
                            bucket.mirrors[*b].iter().any(|m| {
                                m.strip_suffix(suffix)
                                    .is_some_and(|p| bucket.mirrors[*a].iter().any(|am| am == p))
                            })
                        });
                        assert!(!covered, "{} covers {} in the same bucket", a, b);
                    }
                }
            }
        }
    }
}

#[test]
fn test_no_mirror_points_at_the_cache() {
    for mode in [GeneratorMode::DigestsOnly, GeneratorMode::TagsOnly] {
        let mirrors =
            generate_image_mirrors(&mixed_image_list(), mode, false, LOCAL_STORAGE_FQDN).unwrap();
        for bucket in mirrors {
            for values in bucket.mirrors.values() {
                for mirror in values {
                    assert!(!mirror.starts_with(LOCAL_STORAGE_FQDN));
                }
            }
        }
    }
}
