use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MirrorError, Result};

// Constants for protocols and the working-directory layout
/// Transport prefix for remote registry references
pub const DOCKER_PROTOCOL: &str = "docker://";

/// Transport prefix for on-disk OCI layouts
pub const OCI_PROTOCOL: &str = "oci://";

/// Transport prefix for plain directories
pub const DIR_PROTOCOL: &str = "dir://";

/// Transport prefix for file paths
pub const FILE_PROTOCOL: &str = "file://";

/// Directory under the working dir receiving every emitted YAML resource
pub const CLUSTER_RESOURCES_DIR: &str = "cluster-resources";

/// Directory holding raw release signature blobs
pub const SIGNATURES_DIR: &str = "signatures";

/// Directory holding staged release OCI layouts
pub const RELEASE_IMAGES_DIR: &str = "release-images";

/// Directory holding staged operator catalog OCI layouts
pub const OPERATOR_CATALOGS_DIR: &str = "operator-catalogs";

/// Directory holding staged additional-image OCI layouts
pub const ADDITIONAL_IMAGES_DIR: &str = "additional-images";

/// Mapping file written next to the cluster resources
pub const MAPPING_FILE: &str = "mapping.txt";

/// Image config label naming the file-based-catalog configs directory
pub const CONFIGS_LABEL: &str = "operators.operatorframework.io.index.configs.v1";

/// Manifest Accept header for registry requests.
/// Manifest list types come FIRST so multi-arch images resolve to their
/// index rather than a platform-selected manifest.
pub const DEFAULT_MANIFEST_ACCEPT_HEADER: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json";

/// Per-image layer download fan-out advised to the external copier
pub const MAX_PARALLEL_LAYER_DOWNLOADS: usize = 10;

/// Global in-flight download bound advised to the external copier
pub const LIMIT_OVERALL_PARALLEL_DOWNLOADS: usize = 200;

/// Mirroring configuration: the subset of the image-set configuration the
/// core consumes, plus the download caps exposed to the external copier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    /// Host:port of the local cache registry; records destined here are
    /// cache writes, never cluster-visible mirrors.
    #[serde(default, rename = "localStorageFQDN")]
    pub local_storage_fqdn: String,

    #[serde(default)]
    pub operators: Vec<CatalogConfig>,

    #[serde(default = "default_max_parallel_layer_downloads")]
    pub max_parallel_layer_downloads: usize,

    #[serde(default = "default_limit_overall_parallel_downloads")]
    pub limit_overall_parallel_downloads: usize,

    /// Skip TLS verification when talking to the source registry
    #[serde(default)]
    pub source_skip_tls: bool,

    /// Strip signatures while gathering (they are archived separately)
    #[serde(default = "default_true")]
    pub remove_signatures: bool,
}

fn default_max_parallel_layer_downloads() -> usize {
    MAX_PARALLEL_LAYER_DOWNLOADS
}

fn default_limit_overall_parallel_downloads() -> usize {
    LIMIT_OVERALL_PARALLEL_DOWNLOADS
}

fn default_true() -> bool {
    true
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            local_storage_fqdn: String::new(),
            operators: Vec::new(),
            max_parallel_layer_downloads: MAX_PARALLEL_LAYER_DOWNLOADS,
            limit_overall_parallel_downloads: LIMIT_OVERALL_PARALLEL_DOWNLOADS,
            source_skip_tls: false,
            remove_signatures: true,
        }
    }
}

/// One catalog entry of the image-set configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    pub catalog: String,

    #[serde(default)]
    pub packages: Vec<IncludePackage>,

    /// Repository name override for the mirrored catalog
    #[serde(default)]
    pub target_name: Option<String>,

    /// Tag override for the mirrored catalog
    #[serde(default)]
    pub target_tag: Option<String>,

    /// Optional CatalogSource template merged into the emitted resource
    #[serde(default)]
    pub target_catalog_source_template: Option<String>,
}

/// Package selector with an optional semver window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludePackage {
    pub name: String,

    #[serde(default)]
    pub min_version: Option<String>,

    #[serde(default)]
    pub max_version: Option<String>,
}

impl MirrorConfig {
    pub fn from_yaml(data: &str) -> Result<Self> {
        let config: MirrorConfig = serde_yaml::from_str(data)
            .map_err(|e| MirrorError::Config(format!("invalid mirror configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&data)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_layer_downloads == 0 {
            return Err(MirrorError::Config(
                "maxParallelLayerDownloads must be at least 1".to_string(),
            ));
        }
        if self.limit_overall_parallel_downloads < self.max_parallel_layer_downloads {
            return Err(MirrorError::Config(format!(
                "limitOverallParallelDownloads ({}) must not be below maxParallelLayerDownloads ({})",
                self.limit_overall_parallel_downloads, self.max_parallel_layer_downloads
            )));
        }
        for op in &self.operators {
            if op.catalog.is_empty() {
                return Err(MirrorError::Config(
                    "operator entry is missing its catalog reference".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Strip any known transport prefix (`docker://`, `oci://`, `file://`,
/// `dir://`, and the bare `oci:` / `file:` forms) from an image name.
pub fn trim_protocol(image: &str) -> &str {
    let image = image
        .strip_prefix("docker:")
        .or_else(|| image.strip_prefix("oci:"))
        .or_else(|| image.strip_prefix("file:"))
        .or_else(|| image.strip_prefix("dir:"))
        .unwrap_or(image);
    image.strip_prefix("//").unwrap_or(image)
}
