pub mod signature;
pub mod types;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{trim_protocol, CatalogConfig, CLUSTER_RESOURCES_DIR};
use crate::error::{MirrorError, Result};
use crate::mirror::{
    generate_image_mirrors, CategorizedMirrors, CopyRecord, GeneratorMode, ImageCategory,
};
use crate::reference::{is_digest_tag, parse_image_name, ImageReference};
use crate::resources::types::*;

/// Emits the cluster resources a disconnected cluster needs to resolve
/// mirrored images: IDMS/ITMS, CatalogSource per mirrored catalog,
/// UpdateService, and signature ConfigMaps. All files land under
/// `<working_dir>/cluster-resources/` and are written atomically.
pub struct ClusterResourcesGenerator {
    pub working_dir: PathBuf,
    pub local_storage_fqdn: String,
    pub catalogs: Vec<CatalogConfig>,
}

impl ClusterResourcesGenerator {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        local_storage_fqdn: impl Into<String>,
        catalogs: Vec<CatalogConfig>,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            local_storage_fqdn: local_storage_fqdn.into(),
            catalogs,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.working_dir.join(CLUSTER_RESOURCES_DIR)
    }

    /// Generate the digest- and tag-mode mirror sets and write one
    /// combined document set per mode. A mode that yields no rules
    /// produces no file.
    pub fn idms_itms_generator(
        &self,
        records: &[CopyRecord],
        force_repository_scope: bool,
    ) -> Result<()> {
        let digest_mirrors = generate_image_mirrors(
            records,
            GeneratorMode::DigestsOnly,
            force_repository_scope,
            &self.local_storage_fqdn,
        )?;
        let tag_mirrors = generate_image_mirrors(
            records,
            GeneratorMode::TagsOnly,
            force_repository_scope,
            &self.local_storage_fqdn,
        )?;

        std::fs::create_dir_all(self.output_dir())?;

        if !digest_mirrors.is_empty() {
            let idms_list = self.generate_idms(&digest_mirrors)?;
            self.write_yaml_documents("idms-oc-mirror.yaml", &idms_list)?;
        }
        if !tag_mirrors.is_empty() {
            let itms_list = self.generate_itms(&tag_mirrors)?;
            self.write_yaml_documents("itms-oc-mirror.yaml", &itms_list)?;
        }
        Ok(())
    }

    /// One ImageDigestMirrorSet per non-empty bucket, named
    /// `idms-<category>-0`.
    pub fn generate_idms(
        &self,
        mirrors: &[CategorizedMirrors],
    ) -> Result<Vec<ImageDigestMirrorSet>> {
        mirrors
            .iter()
            .map(|bucket| {
                let name = format!("idms-{}-0", bucket.category.as_str());
                ensure_valid_name(&name)?;
                Ok(ImageDigestMirrorSet {
                    api_version: CONFIG_API_VERSION.to_string(),
                    kind: IDMS_KIND.to_string(),
                    metadata: Metadata {
                        name,
                        ..Default::default()
                    },
                    spec: ImageDigestMirrorSetSpec {
                        image_digest_mirrors: bucket_mirrors(bucket),
                    },
                })
            })
            .collect()
    }

    /// One ImageTagMirrorSet per non-empty bucket, named
    /// `itms-<category>-0`.
    pub fn generate_itms(&self, mirrors: &[CategorizedMirrors]) -> Result<Vec<ImageTagMirrorSet>> {
        mirrors
            .iter()
            .map(|bucket| {
                let name = format!("itms-{}-0", bucket.category.as_str());
                ensure_valid_name(&name)?;
                Ok(ImageTagMirrorSet {
                    api_version: CONFIG_API_VERSION.to_string(),
                    kind: ITMS_KIND.to_string(),
                    metadata: Metadata {
                        name,
                        ..Default::default()
                    },
                    spec: ImageTagMirrorSetSpec {
                        image_tag_mirrors: bucket_mirrors(bucket),
                    },
                })
            })
            .collect()
    }

    /// One CatalogSource per mirrored operator catalog. Records destined
    /// to the local cache are cache writes, not cluster-visible catalogs,
    /// and are skipped.
    pub fn catalog_source_generator(&self, records: &[CopyRecord]) -> Result<()> {
        for record in records {
            if record.category != ImageCategory::OperatorCatalog {
                continue;
            }
            let destination = match ImageReference::parse(&record.destination) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(
                        destination = %record.destination,
                        error = %e,
                        "skipping catalog with unparsable destination"
                    );
                    continue;
                }
            };
            if destination.registry == self.local_storage_fqdn {
                tracing::debug!(
                    destination = %record.destination,
                    "skipping cache-destined catalog"
                );
                continue;
            }
            self.generate_catalog_source(record, &destination)?;
        }
        Ok(())
    }

    fn generate_catalog_source(
        &self,
        record: &CopyRecord,
        destination: &ImageReference,
    ) -> Result<()> {
        let name = catalog_source_name(destination)?;
        let image = trim_protocol(&destination.exact()).to_string();

        let template_path = self
            .catalogs
            .iter()
            .find(|entry| trim_protocol(&entry.catalog) == trim_protocol(&record.origin))
            .and_then(|entry| entry.target_catalog_source_template.as_deref());

        let mut spec = template_path
            .and_then(spec_from_template)
            .unwrap_or_default();
        // image and name are always computed; sourceType falls back to the
        // only type a mirrored catalog can have
        if spec.source_type.is_empty() {
            spec.source_type = "grpc".to_string();
        }
        spec.image = image;

        let catalog_source = CatalogSource {
            api_version: CATALOG_SOURCE_API_VERSION.to_string(),
            kind: CATALOG_SOURCE_KIND.to_string(),
            metadata: Metadata {
                name: name.clone(),
                namespace: Some(CATALOG_SOURCE_NAMESPACE.to_string()),
                ..Default::default()
            },
            spec,
        };

        std::fs::create_dir_all(self.output_dir())?;
        let contents = serde_yaml::to_string(&catalog_source)
            .map_err(|e| MirrorError::Config(format!("serializing CatalogSource: {}", e)))?;
        write_atomic(&self.output_dir().join(format!("{}.yaml", name)), contents.as_bytes())?;
        tracing::info!(name = %name, image = %catalog_source.spec.image, "wrote CatalogSource");
        Ok(())
    }

    /// Single UpdateService resource pointing the cluster at the mirrored
    /// upgrade graph. `releases` is the release image stripped to its bare
    /// repository path.
    pub fn update_service_generator(&self, graph_image: &str, release_image: &str) -> Result<()> {
        let (registry, namespace, repository, _, _) = parse_image_name(release_image);
        let releases = [registry, namespace, repository]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("/");

        let update_service = UpdateService {
            api_version: UPDATE_SERVICE_API_VERSION.to_string(),
            kind: UPDATE_SERVICE_KIND.to_string(),
            metadata: Metadata {
                name: "update-service-oc-mirror".to_string(),
                ..Default::default()
            },
            spec: UpdateServiceSpec {
                replicas: 2,
                releases,
                graph_data_image: trim_protocol(graph_image).to_string(),
            },
        };
        ensure_valid_name(&update_service.metadata.name)?;

        std::fs::create_dir_all(self.output_dir())?;
        let contents = serde_yaml::to_string(&update_service)
            .map_err(|e| MirrorError::Config(format!("serializing UpdateService: {}", e)))?;
        write_atomic(&self.output_dir().join("updateservice.yaml"), contents.as_bytes())?;
        Ok(())
    }

    fn write_yaml_documents<T: Serialize>(&self, filename: &str, documents: &[T]) -> Result<()> {
        let mut rendered = Vec::with_capacity(documents.len());
        for document in documents {
            rendered.push(
                serde_yaml::to_string(document)
                    .map_err(|e| MirrorError::Config(format!("serializing {}: {}", filename, e)))?,
            );
        }
        write_atomic(
            &self.output_dir().join(filename),
            rendered.join("---\n").as_bytes(),
        )?;
        tracing::info!(file = %filename, documents = documents.len(), "wrote mirror set");
        Ok(())
    }
}

fn bucket_mirrors(bucket: &CategorizedMirrors) -> Vec<ImageMirrors> {
    bucket
        .mirrors
        .iter()
        .map(|(source, mirrors)| ImageMirrors {
            source: source.clone(),
            mirrors: mirrors.clone(),
        })
        .collect()
}

fn ensure_valid_name(name: &str) -> Result<()> {
    if is_valid_rfc1123(name) {
        Ok(())
    } else {
        Err(MirrorError::NameViolation {
            name: name.to_string(),
        })
    }
}

/// CatalogSource name for a mirrored catalog reference: the repository
/// plus the tag (dots sanitized, digest-as-tags truncated to 12 hex
/// chars), or the first 12 digest chars when no tag exists.
fn catalog_source_name(destination: &ImageReference) -> Result<String> {
    let suffix = if destination.is_tag() {
        if is_digest_tag(&destination.tag) {
            destination.tag[..12].to_string()
        } else {
            destination.tag.replace('.', "-")
        }
    } else if destination.is_digest() {
        let hex = destination
            .digest
            .split_once(':')
            .map(|(_, hex)| hex)
            .unwrap_or(destination.digest.as_str());
        hex[..hex.len().min(12)].to_string()
    } else {
        "latest".to_string()
    };

    let name = format!("cs-{}-{}", destination.repository, suffix).replace('.', "-");
    ensure_valid_name(&name)?;
    Ok(name)
}

/// Parse a CatalogSource template; an unreadable or unparsable template is
/// logged and ignored so generation still succeeds with defaults.
fn spec_from_template(path: &str) -> Option<CatalogSourceSpec> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(template = %path, error = %e, "cannot read CatalogSource template, using defaults");
            return None;
        }
    };
    let template: CatalogSource = match serde_yaml::from_str(&data) {
        Ok(template) => template,
        Err(e) => {
            tracing::warn!(template = %path, error = %e, "invalid CatalogSource template, using defaults");
            return None;
        }
    };
    if !template.kind.is_empty() && template.kind != CATALOG_SOURCE_KIND {
        tracing::warn!(
            template = %path,
            kind = %template.kind,
            "template is not a CatalogSource, using defaults"
        );
        return None;
    }
    Some(template.spec)
}

/// Write-temp-then-rename so a crash mid-emit leaves either the previous
/// or the new file, never a partial one.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, contents)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}
