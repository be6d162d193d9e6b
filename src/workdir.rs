use std::path::Path;

use crate::config::{
    ADDITIONAL_IMAGES_DIR, CLUSTER_RESOURCES_DIR, OPERATOR_CATALOGS_DIR, RELEASE_IMAGES_DIR,
    SIGNATURES_DIR,
};
use crate::error::Result;

/// Create the working-directory layout a mirror run expects. Existing
/// directories are left alone; the working dir is owned by a single
/// pipeline invocation.
pub fn create_working_dirs(root: impl AsRef<Path>) -> Result<()> {
    let root = root.as_ref();
    for dir in [
        CLUSTER_RESOURCES_DIR,
        SIGNATURES_DIR,
        RELEASE_IMAGES_DIR,
        OPERATOR_CATALOGS_DIR,
        ADDITIONAL_IMAGES_DIR,
    ] {
        let path = root.join(dir);
        if path.is_dir() {
            tracing::debug!(path = %path.display(), "found working directory");
        } else {
            tracing::info!(path = %path.display(), "creating working directory");
            std::fs::create_dir_all(&path)?;
        }
    }
    Ok(())
}
