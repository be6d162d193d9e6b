use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Deserialize;
use tar::Archive;
use tokio_util::sync::CancellationToken;

use crate::config::CONFIGS_LABEL;
use crate::error::{MirrorError, Result};

#[derive(Debug, Deserialize)]
struct OciIndex {
    #[serde(default)]
    manifests: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    #[serde(default)]
    digest: String,
}

#[derive(Debug, Deserialize)]
struct OciManifest {
    config: Descriptor,
    #[serde(default)]
    layers: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
struct ImageConfig {
    #[serde(default)]
    config: ContainerConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerConfig {
    #[serde(default, rename = "Labels")]
    labels: std::collections::HashMap<String, String>,
}

/// Extracts the file-based-catalog configs directory out of an OCI-format
/// catalog on local disk.
pub struct FbcExtractor {
    layout_path: PathBuf,
    /// catalog display name for logs and errors
    catalog: String,
}

impl FbcExtractor {
    pub fn new(layout_path: impl Into<PathBuf>, catalog: impl Into<String>) -> Self {
        Self {
            layout_path: layout_path.into(),
            catalog: catalog.into(),
        }
    }

    /// Name of the configs directory inside the catalog's layers, read
    /// from the image config label.
    pub fn configs_dir_name(&self) -> Result<String> {
        let manifest = self.single_manifest()?;
        let config_blob = std::fs::read(self.blob_path(&manifest.config.digest))?;
        let image_config: ImageConfig = serde_json::from_slice(&config_blob)?;
        match image_config.config.labels.get(CONFIGS_LABEL) {
            Some(dir) => Ok(dir.trim_matches('/').to_string()),
            None => Err(MirrorError::MissingConfigsLabel {
                catalog: self.catalog.clone(),
                label: CONFIGS_LABEL.to_string(),
            }),
        }
    }

    /// Untar every catalog layer into `scratch_dir`, keeping only entries
    /// under the configs directory, and return the materialized configs
    /// path. A cancelled extraction removes the partial scratch directory.
    pub fn extract_configs(
        &self,
        scratch_dir: &Path,
        token: &CancellationToken,
    ) -> Result<PathBuf> {
        let configs_dir_name = self.configs_dir_name()?;
        let manifest = self.single_manifest()?;

        tracing::info!(
            catalog = %self.catalog,
            configs_dir = %configs_dir_name,
            layers = manifest.layers.len(),
            "extracting file-based catalog"
        );

        for layer in &manifest.layers {
            if token.is_cancelled() {
                let _ = std::fs::remove_dir_all(scratch_dir);
                return Err(MirrorError::Cancelled);
            }
            let reader = File::open(self.blob_path(&layer.digest))?;
            self.untar_layer(reader, scratch_dir, &configs_dir_name, token)?;
        }

        let configs_path = scratch_dir.join(&configs_dir_name);
        let has_packages = configs_path
            .read_dir()
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if !has_packages {
            return Err(MirrorError::CatalogExtract {
                catalog: self.catalog.clone(),
                reason: "no packages found in catalog".to_string(),
            });
        }
        Ok(configs_path)
    }

    fn single_manifest(&self) -> Result<OciManifest> {
        let index_data = std::fs::read(self.layout_path.join("index.json"))?;
        let index: OciIndex = serde_json::from_slice(&index_data)?;
        if index.manifests.len() != 1 {
            return Err(MirrorError::AmbiguousCatalog {
                catalog: self.catalog.clone(),
            });
        }
        let manifest_data = std::fs::read(self.blob_path(&index.manifests[0].digest))?;
        let manifest: OciManifest = serde_json::from_slice(&manifest_data)?;
        Ok(manifest)
    }

    fn blob_path(&self, digest: &str) -> PathBuf {
        let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
        self.layout_path.join("blobs").join("sha256").join(hex)
    }

    fn untar_layer(
        &self,
        reader: impl Read,
        scratch_dir: &Path,
        configs_dir_name: &str,
        token: &CancellationToken,
    ) -> Result<()> {
        let decoder = GzDecoder::new(reader);
        let mut archive = Archive::new(decoder);

        for entry in archive.entries().map_err(|e| self.extract_error(e))? {
            if token.is_cancelled() {
                let _ = std::fs::remove_dir_all(scratch_dir);
                return Err(MirrorError::Cancelled);
            }
            let mut entry = entry.map_err(|e| self.extract_error(e))?;
            let path = entry.path().map_err(|e| self.extract_error(e))?.into_owned();
            let name = path.to_string_lossy().to_string();
            if !name.contains(configs_dir_name) {
                continue;
            }
            if path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                tracing::warn!(entry = %name, "skipping tar entry escaping the scratch dir");
                continue;
            }

            let target = scratch_dir.join(&path);
            let entry_type = entry.header().entry_type();
            if entry_type.is_dir() {
                std::fs::create_dir_all(&target)?;
            } else if entry_type.is_file() {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&target)?;
                std::io::copy(&mut entry, &mut out)?;
            } else {
                tracing::warn!(
                    entry = %name,
                    kind = ?entry_type,
                    "skipping unsupported tar entry type"
                );
            }
        }
        Ok(())
    }

    fn extract_error(&self, err: impl std::fmt::Display) -> MirrorError {
        MirrorError::CatalogExtract {
            catalog: self.catalog.clone(),
            reason: err.to_string(),
        }
    }
}
