pub mod upstream;

pub use upstream::UpstreamClient;

use async_trait::async_trait;

use crate::error::Result;

/// Read access to one image's manifests, however they are stored.
///
/// `instance` selects a child manifest of a multi-arch index by digest;
/// `None` returns the top-level manifest. Implementations return the raw
/// bytes together with their media type.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn get_manifest(&self, instance: Option<&str>) -> Result<(Vec<u8>, String)>;
}

/// True for media types denoting a manifest list / image index.
pub fn is_multi_image(media_type: &str) -> bool {
    media_type.contains("manifest.list") || media_type.contains("image.index")
}
