use std::collections::HashMap;

use futures::future;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::config::MirrorConfig;
use crate::error::{ErrorList, MirrorError, Result};
use crate::reference::ImageReference;
use crate::registry::upstream::{SystemContext, UpstreamClient};
use crate::registry::{is_multi_image, ImageSource};

/// Enumerates every blob digest belonging to an image so the archive stage
/// can pull them: the top-level manifest digest, every child-instance
/// digest of a multi-arch index, and each manifest's config and layer
/// digests.
pub struct BlobGatherer {
    ctx: SystemContext,
    image_concurrency: usize,
}

impl BlobGatherer {
    pub fn new(config: &MirrorConfig) -> Self {
        Self {
            ctx: SystemContext {
                skip_tls_verify: config.source_skip_tls,
                remove_signatures: config.remove_signatures,
            },
            image_concurrency: config.max_parallel_layer_downloads,
        }
    }

    /// Gather blobs for a whole image list, bounded by the configured
    /// fan-out. Per-image failures are collected and surfaced as one
    /// aggregated error once every image has been attempted.
    pub async fn gather_blobs_for_images(
        &self,
        token: &CancellationToken,
        images: &[String],
    ) -> Result<HashMap<String, HashMap<String, String>>> {
        let semaphore = tokio::sync::Semaphore::new(self.image_concurrency.max(1));
        let tasks = images.iter().map(|image| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.unwrap();
                self.gather_blobs(token, image).await
            }
        });
        let results = future::join_all(tasks).await;

        let mut errors = ErrorList::new("blob gather");
        let mut gathered = HashMap::new();
        for (image, result) in images.iter().zip(results) {
            match result {
                Ok(blobs) => {
                    gathered.insert(image.clone(), blobs);
                }
                Err(e) => errors.push(image, e),
            }
        }
        errors.into_result()?;
        Ok(gathered)
    }

    /// Gather blobs for `image_ref`, opening an upstream source for it.
    pub async fn gather_blobs(
        &self,
        token: &CancellationToken,
        image_ref: &str,
    ) -> Result<HashMap<String, String>> {
        let reference = ImageReference::parse(image_ref)?;
        let source = UpstreamClient::new(&reference, &self.ctx)?;
        self.gather_blobs_from(token, image_ref, &source).await
    }

    /// Gather blobs using a caller-supplied image source.
    ///
    /// The map values are reserved for a future media-type payload; every
    /// current caller writes the empty string.
    pub async fn gather_blobs_from(
        &self,
        token: &CancellationToken,
        image_ref: &str,
        source: &dyn ImageSource,
    ) -> Result<HashMap<String, String>> {
        let mut blobs = HashMap::new();

        if token.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }
        let (manifest_bytes, media_type) = source.get_manifest(None).await?;

        let digest = format!("sha256:{:x}", Sha256::digest(&manifest_bytes));
        blobs.insert(digest, String::new());

        if is_multi_image(&media_type) {
            let instances = manifest_list_instances(image_ref, &manifest_bytes)?;
            tracing::debug!(
                image = %image_ref,
                instances = instances.len(),
                "walking multi-arch manifest"
            );
            for instance in instances {
                if token.is_cancelled() {
                    return Err(MirrorError::Cancelled);
                }
                blobs.insert(instance.clone(), String::new());
                let (child_bytes, child_mime) = source.get_manifest(Some(&instance)).await?;
                for digest in blobs_of_single_manifest(image_ref, &child_bytes, &child_mime)? {
                    blobs.insert(digest, String::new());
                }
            }
        } else {
            for digest in blobs_of_single_manifest(image_ref, &manifest_bytes, &media_type)? {
                blobs.insert(digest, String::new());
            }
        }

        tracing::info!(image = %image_ref, blobs = blobs.len(), "gathered blobs");
        Ok(blobs)
    }
}

/// Child-instance digests of a manifest list, in declaration order.
fn manifest_list_instances(image_ref: &str, manifest_bytes: &[u8]) -> Result<Vec<String>> {
    let manifest: serde_json::Value =
        serde_json::from_slice(manifest_bytes).map_err(|e| MirrorError::ManifestFetch {
            image: image_ref.to_string(),
            reason: format!("unmarshalling manifest list: {}", e),
        })?;

    let manifests = manifest
        .get("manifests")
        .and_then(|m| m.as_array())
        .ok_or_else(|| MirrorError::ManifestFetch {
            image: image_ref.to_string(),
            reason: "manifest list has no manifests array".to_string(),
        })?;

    let mut instances = Vec::with_capacity(manifests.len());
    for descriptor in manifests {
        let digest = descriptor
            .get("digest")
            .and_then(|d| d.as_str())
            .ok_or_else(|| MirrorError::ManifestFetch {
                image: image_ref.to_string(),
                reason: "manifest descriptor missing digest".to_string(),
            })?;
        instances.push(digest.to_string());
    }
    Ok(instances)
}

/// Config digest plus all layer digests of a single-arch manifest.
pub fn blobs_of_single_manifest(
    image_ref: &str,
    manifest_bytes: &[u8],
    media_type: &str,
) -> Result<Vec<String>> {
    if is_multi_image(media_type) {
        return Err(MirrorError::ManifestFetch {
            image: image_ref.to_string(),
            reason: format!("expected single-arch manifest, got {}", media_type),
        });
    }

    let manifest: serde_json::Value =
        serde_json::from_slice(manifest_bytes).map_err(|e| MirrorError::ManifestFetch {
            image: image_ref.to_string(),
            reason: format!("unmarshalling manifest: {}", e),
        })?;

    let mut digests = Vec::new();
    if let Some(layers) = manifest.get("layers").and_then(|l| l.as_array()) {
        for layer in layers {
            if let Some(digest) = layer.get("digest").and_then(|d| d.as_str()) {
                digests.push(digest.to_string());
            }
        }
    }
    if let Some(config_digest) = manifest
        .get("config")
        .and_then(|c| c.get("digest"))
        .and_then(|d| d.as_str())
    {
        digests.push(config_digest.to_string());
    }

    if digests.is_empty() {
        return Err(MirrorError::ManifestFetch {
            image: image_ref.to_string(),
            reason: "manifest has neither config nor layers".to_string(),
        });
    }
    Ok(digests)
}
