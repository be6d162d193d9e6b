use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{MirrorError, Result};
use crate::resources::types::*;
use crate::resources::ClusterResourcesGenerator;

impl ClusterResourcesGenerator {
    /// Package one release signature into a ConfigMap, emitted both as
    /// YAML and JSON. The binaryData key and the file stem carry the full
    /// digest; the resource name uses a 12-char digest prefix so it fits
    /// the DNS label limit. The visible suffix is `ordinal + 1`.
    pub fn generate_signature_config_map(
        &self,
        digest: &str,
        ordinal: usize,
        signature: &[u8],
    ) -> Result<()> {
        if digest.is_empty() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MirrorError::Config(format!(
                "signature digest {:?} is not a hex digest",
                digest
            )));
        }

        let stem = format!("sha256-{}-{}", digest, ordinal + 1);
        let name = format!("sha256-{}-{}", &digest[..digest.len().min(12)], ordinal + 1);
        if !is_valid_rfc1123(&name) {
            return Err(MirrorError::NameViolation { name });
        }

        let mut binary_data = BTreeMap::new();
        binary_data.insert(stem.clone(), STANDARD.encode(signature));

        let mut labels = BTreeMap::new();
        labels.insert(SIGNATURE_LABEL.to_string(), String::new());

        let config_map = ConfigMap {
            api_version: CONFIG_MAP_API_VERSION.to_string(),
            kind: CONFIG_MAP_KIND.to_string(),
            metadata: Metadata {
                name,
                namespace: Some(SIGNATURE_CONFIG_MAP_NAMESPACE.to_string()),
                labels: Some(labels),
            },
            binary_data,
        };

        std::fs::create_dir_all(self.output_dir())?;
        let yaml = serde_yaml::to_string(&config_map)
            .map_err(|e| MirrorError::Config(format!("serializing signature ConfigMap: {}", e)))?;
        super::write_atomic(
            &self.output_dir().join(format!("{}.yaml", stem)),
            yaml.as_bytes(),
        )?;
        let json = serde_json::to_vec_pretty(&config_map)?;
        super::write_atomic(&self.output_dir().join(format!("{}.json", stem)), &json)?;

        tracing::info!(digest = %digest, bytes = signature.len(), "wrote signature ConfigMap");
        Ok(())
    }
}
