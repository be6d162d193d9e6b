use std::path::Path;

use serde::Deserialize;
use walkdir::WalkDir;

use crate::config::IncludePackage;
use crate::error::{MirrorError, Result};

const SCHEMA_PACKAGE: &str = "olm.package";
const SCHEMA_CHANNEL: &str = "olm.channel";
const SCHEMA_BUNDLE: &str = "olm.bundle";

/// File-based catalog contents: three owned tables referencing each other
/// by name.
#[derive(Debug, Default, Clone)]
pub struct DeclarativeConfig {
    pub packages: Vec<Package>,
    pub channels: Vec<Channel>,
    pub bundles: Vec<Bundle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "defaultChannel")]
    pub default_channel: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub package: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default, rename = "relatedImages")]
    pub related_images: Vec<RelatedImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Property {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelatedImage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
}

/// Load every declarative-config document under `dir`. JSON files may hold
/// a stream of concatenated objects, YAML files multiple documents.
pub fn load_configs_dir(dir: impl AsRef<Path>) -> Result<DeclarativeConfig> {
    let dir = dir.as_ref();
    let mut config = DeclarativeConfig::default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| MirrorError::CatalogExtract {
            catalog: dir.display().to_string(),
            reason: format!("walking configs dir: {}", e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let data = std::fs::read_to_string(entry.path())?;
        match ext {
            "json" => {
                let stream = serde_json::Deserializer::from_str(&data).into_iter::<serde_json::Value>();
                for value in stream {
                    let value = value.map_err(|e| load_error(dir, entry.path(), e))?;
                    absorb_document(&mut config, value)
                        .map_err(|e| load_error(dir, entry.path(), e))?;
                }
            }
            "yaml" | "yml" => {
                for doc in serde_yaml::Deserializer::from_str(&data) {
                    let value = serde_json::Value::deserialize(doc)
                        .map_err(|e| load_error(dir, entry.path(), e))?;
                    if !value.is_null() {
                        absorb_document(&mut config, value)
                            .map_err(|e| load_error(dir, entry.path(), e))?;
                    }
                }
            }
            _ => {
                tracing::debug!(path = %entry.path().display(), "skipping non-config file");
            }
        }
    }
    Ok(config)
}

fn load_error(
    dir: &Path,
    path: &Path,
    err: impl std::fmt::Display,
) -> MirrorError {
    MirrorError::CatalogExtract {
        catalog: dir.display().to_string(),
        reason: format!("parsing {}: {}", path.display(), err),
    }
}

fn absorb_document(config: &mut DeclarativeConfig, value: serde_json::Value) -> serde_json::Result<()> {
    let schema = value
        .get("schema")
        .and_then(|s| s.as_str())
        .unwrap_or_default()
        .to_string();
    match schema.as_str() {
        SCHEMA_PACKAGE => config.packages.push(serde_json::from_value(value)?),
        SCHEMA_CHANNEL => config.channels.push(serde_json::from_value(value)?),
        SCHEMA_BUNDLE => config.bundles.push(serde_json::from_value(value)?),
        other => {
            tracing::debug!(schema = %other, "ignoring declarative config document");
        }
    }
    Ok(())
}

/// The bundle's version from its `olm.package` property.
fn bundle_version(catalog: &str, bundle: &Bundle) -> Result<semver::Version> {
    #[derive(Deserialize)]
    struct PackageProperty {
        #[serde(default)]
        version: String,
    }

    for property in &bundle.properties {
        if property.kind == SCHEMA_PACKAGE {
            let parsed: PackageProperty = serde_json::from_value(property.value.clone())?;
            return semver::Version::parse(&parsed.version).map_err(|e| {
                MirrorError::CatalogExtract {
                    catalog: catalog.to_string(),
                    reason: format!("bundle {}: invalid version {:?}: {}", bundle.name, parsed.version, e),
                }
            });
        }
    }
    Err(MirrorError::CatalogExtract {
        catalog: catalog.to_string(),
        reason: format!("unable to find version for bundle {}", bundle.name),
    })
}

fn parse_bound(catalog: &str, bundle: &str, bound: &str) -> Result<semver::Version> {
    semver::Version::parse(bound).map_err(|e| MirrorError::CatalogExtract {
        catalog: catalog.to_string(),
        reason: format!("bundle {}: invalid version bound {:?}: {}", bundle, bound, e),
    })
}

fn is_bundle_selected(
    catalog: &str,
    bundle: &Bundle,
    selectors: &[IncludePackage],
) -> Result<bool> {
    for selector in selectors {
        if selector.name != bundle.package {
            continue;
        }
        let min = selector.min_version.as_deref().filter(|v| !v.is_empty());
        let max = selector.max_version.as_deref().filter(|v| !v.is_empty());
        if min.is_none() && max.is_none() {
            return Ok(true);
        }
        let version = bundle_version(catalog, bundle)?;
        let in_window = match (min, max) {
            (Some(min), Some(max)) => {
                version >= parse_bound(catalog, &bundle.name, min)?
                    && version <= parse_bound(catalog, &bundle.name, max)?
            }
            (Some(min), None) => version >= parse_bound(catalog, &bundle.name, min)?,
            (None, Some(max)) => version <= parse_bound(catalog, &bundle.name, max)?,
            (None, None) => true,
        };
        if in_window {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Every image the selected bundles need mirrored: the bundle image itself
/// plus its declared related images, deduplicated by image reference in
/// first-seen order. No selectors selects every package in the catalog.
pub fn related_images(
    catalog: &str,
    config: &DeclarativeConfig,
    selectors: &[IncludePackage],
) -> Result<Vec<RelatedImage>> {
    let mut all = Vec::new();
    for bundle in &config.bundles {
        let selected = selectors.is_empty() || is_bundle_selected(catalog, bundle, selectors)?;
        if !selected {
            continue;
        }
        all.push(RelatedImage {
            name: bundle.package.clone(),
            image: bundle.image.clone(),
        });
        all.extend(bundle.related_images.iter().cloned());
    }

    let mut deduped: Vec<RelatedImage> = Vec::with_capacity(all.len());
    for image in all {
        if image.image.is_empty() {
            tracing::warn!(name = %image.name, "invalid related image: reference empty");
            continue;
        }
        if !deduped.iter().any(|existing| existing.image == image.image) {
            deduped.push(image);
        }
    }
    Ok(deduped)
}
