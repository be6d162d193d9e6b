use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::reference::{ImageReference, Transport};

/// Semantic category attached to every copy record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageCategory {
    OcpRelease,
    OcpReleaseContent,
    CincinnatiGraph,
    OperatorCatalog,
    OperatorBundle,
    OperatorRelatedImage,
    Generic,
}

/// Mirror-resource bucket a record lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorCategory {
    Operator,
    Release,
    Generic,
}

impl MirrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorCategory::Operator => "operator",
            MirrorCategory::Release => "release",
            MirrorCategory::Generic => "generic",
        }
    }
}

/// One planned copy. `origin` is what the cluster would have pulled absent
/// mirroring; `source` is where this run reads from (often the local
/// cache); `destination` is where the image lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRecord {
    pub source: String,
    pub destination: String,
    pub origin: String,
    pub category: ImageCategory,
}

/// Whether mirror rules are derived from digest- or tag-addressed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    DigestsOnly,
    TagsOnly,
}

/// Mirror rules for one bucket. Keys are source prefixes (never ending in
/// `/`, none a prefix of another after folding); values keep insertion
/// order because mirrors are a priority list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizedMirrors {
    pub category: MirrorCategory,
    pub mirrors: BTreeMap<String, Vec<String>>,
}

impl CategorizedMirrors {
    fn new(category: MirrorCategory) -> Self {
        Self {
            category,
            mirrors: BTreeMap::new(),
        }
    }
}

fn mirror_category(category: ImageCategory) -> Option<MirrorCategory> {
    match category {
        ImageCategory::OcpRelease | ImageCategory::OcpReleaseContent => {
            Some(MirrorCategory::Release)
        }
        ImageCategory::OperatorCatalog
        | ImageCategory::OperatorBundle
        | ImageCategory::OperatorRelatedImage => Some(MirrorCategory::Operator),
        ImageCategory::Generic => Some(MirrorCategory::Generic),
        // handled by the UpdateService resource, never by a mirror rule
        ImageCategory::CincinnatiGraph => None,
    }
}

/// Derive the minimal mirror rule set for one generator mode.
///
/// Records are filtered (wrong address mode, cache-destined, oci-origin,
/// graph and catalog images), reduced to a source-prefix → mirror-prefix
/// pair each, then folded so no source key stays a strict prefix of
/// another in the same bucket. Buckets come back in operator, release,
/// generic order with empty buckets dropped.
pub fn generate_image_mirrors(
    records: &[CopyRecord],
    mode: GeneratorMode,
    force_repository_scope: bool,
    local_storage_fqdn: &str,
) -> Result<Vec<CategorizedMirrors>> {
    let mut operator = CategorizedMirrors::new(MirrorCategory::Operator);
    let mut release = CategorizedMirrors::new(MirrorCategory::Release);
    let mut generic = CategorizedMirrors::new(MirrorCategory::Generic);

    for record in records {
        let bucket = match mirror_category(record.category) {
            Some(c) => c,
            None => continue,
        };
        // The CatalogSource references the mirrored catalog image directly;
        // a mirror rule covering the catalog repository would be redundant
        // and widen the rule set.
        if record.category == ImageCategory::OperatorCatalog {
            continue;
        }

        let origin = match ImageReference::parse(&record.origin) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(origin = %record.origin, error = %e, "skipping record with unparsable origin");
                continue;
            }
        };
        // Local catalog files have no upstream the cluster could pull from
        if origin.transport != Transport::Docker {
            continue;
        }

        let destination = match ImageReference::parse(&record.destination) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(destination = %record.destination, error = %e, "skipping record with unparsable destination");
                continue;
            }
        };

        match mode {
            GeneratorMode::DigestsOnly => {
                if !origin.is_digest() {
                    continue;
                }
            }
            GeneratorMode::TagsOnly => {
                if origin.is_digest() || !origin.is_tag() {
                    continue;
                }
                // A cache write is not a cluster-visible mirror
                if destination.registry == local_storage_fqdn {
                    tracing::debug!(
                        destination = %record.destination,
                        "skipping cache-destined record"
                    );
                    continue;
                }
            }
        }

        let (source_key, mirror_value) = derive_rule(&origin, &destination, force_repository_scope);

        let target = match bucket {
            MirrorCategory::Operator => &mut operator,
            MirrorCategory::Release => &mut release,
            MirrorCategory::Generic => &mut generic,
        };
        fold_into(&mut target.mirrors, source_key, mirror_value);
    }

    Ok([operator, release, generic]
        .into_iter()
        .filter(|c| !c.mirrors.is_empty())
        .collect())
}

/// Source prefix and mirror prefix for one record. Repository scope keeps
/// the repository component; otherwise the rule stops at the namespace
/// (or the bare registry when the origin has none).
fn derive_rule(
    origin: &ImageReference,
    destination: &ImageReference,
    force_repository_scope: bool,
) -> (String, String) {
    if force_repository_scope {
        (origin.name(), destination.name())
    } else {
        let source = if origin.namespace.is_empty() {
            origin.registry.clone()
        } else {
            format!("{}/{}", origin.registry, origin.namespace)
        };
        let mirror = if destination.namespace.is_empty() {
            destination.registry.clone()
        } else {
            format!("{}/{}", destination.registry, destination.namespace)
        };
        (source, mirror)
    }
}

/// Insert a rule, collapsing prefix-related keys.
///
/// If an existing entry already covers the new rule (shorter key, same
/// suffix on both sides) nothing changes; if the new rule covers an
/// existing entry the shorter pair replaces it; otherwise it is a new
/// entry, appending to the mirror priority list on an exact key match.
fn fold_into(mirrors: &mut BTreeMap<String, Vec<String>>, source_key: String, mirror_value: String) {
    if let Some(existing) = mirrors.get_mut(&source_key) {
        if !existing.contains(&mirror_value) {
            existing.push(mirror_value);
        }
        return;
    }

    // Covered by a shorter existing rule with a matching suffix
    for (key, values) in mirrors.iter() {
        if let Some(suffix) = source_key.strip_prefix(key.as_str()) {
            if values
                .iter()
                .any(|m| mirror_value.strip_suffix(suffix) == Some(m))
            {
                return;
            }
        }
    }

    // The new rule covers one or more longer existing entries: drop them
    let covered: Vec<String> = mirrors
        .iter()
        .filter(|(key, values)| {
            key.strip_prefix(source_key.as_str())
                .map(|suffix| {
                    values
                        .iter()
                        .all(|m| m.strip_suffix(suffix) == Some(mirror_value.as_str()))
                })
                .unwrap_or(false)
        })
        .map(|(key, _)| key.clone())
        .collect();
    for key in covered {
        mirrors.remove(&key);
    }

    mirrors.insert(source_key, vec![mirror_value]);
}
