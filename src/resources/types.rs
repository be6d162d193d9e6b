use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const IDMS_KIND: &str = "ImageDigestMirrorSet";
pub const ITMS_KIND: &str = "ImageTagMirrorSet";
pub const CONFIG_API_VERSION: &str = "config.openshift.io/v1";
pub const CATALOG_SOURCE_KIND: &str = "CatalogSource";
pub const CATALOG_SOURCE_API_VERSION: &str = "operators.coreos.com/v1alpha1";
pub const CATALOG_SOURCE_NAMESPACE: &str = "openshift-marketplace";
pub const UPDATE_SERVICE_KIND: &str = "UpdateService";
pub const UPDATE_SERVICE_API_VERSION: &str = "updateservice.operator.openshift.io/v1";
pub const CONFIG_MAP_KIND: &str = "ConfigMap";
pub const CONFIG_MAP_API_VERSION: &str = "v1";
pub const SIGNATURE_CONFIG_MAP_NAMESPACE: &str = "openshift-config-managed";
pub const SIGNATURE_LABEL: &str = "release.openshift.io/verification-signatures";

/// `metadata` of an emitted resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageDigestMirrorSet {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: ImageDigestMirrorSetSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDigestMirrorSetSpec {
    pub image_digest_mirrors: Vec<ImageMirrors>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageTagMirrorSet {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: ImageTagMirrorSetSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTagMirrorSetSpec {
    pub image_tag_mirrors: Vec<ImageMirrors>,
}

/// One source prefix and its ordered mirror list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMirrors {
    pub source: String,
    pub mirrors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSource {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: CatalogSourceSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSourceSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<UpdateStrategy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_poll: Option<RegistryPoll>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPoll {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateService {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: UpdateServiceSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceSpec {
    pub replicas: i32,
    pub releases: String,
    pub graph_data_image: String,
}

/// ConfigMap carrying binary payloads; values are base64 on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigMap {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary_data: BTreeMap<String, String>,
}

/// RFC 1123 DNS label: lowercase alphanumerics and dashes, alphanumeric at
/// both ends, at most 63 characters.
pub fn is_valid_rfc1123(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    let bytes = name.as_bytes();
    let inner_ok = bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    inner_ok && edge_ok(bytes[0]) && edge_ok(bytes[bytes.len() - 1])
}
