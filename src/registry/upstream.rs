use async_trait::async_trait;
use reqwest::Client;

use crate::config::DEFAULT_MANIFEST_ACCEPT_HEADER;
use crate::error::{MirrorError, Result};
use crate::reference::ImageReference;
use crate::registry::ImageSource;

/// System-level knobs honored when opening an image source.
#[derive(Debug, Clone, Default)]
pub struct SystemContext {
    pub skip_tls_verify: bool,
    pub remove_signatures: bool,
}

/// HTTP client reading manifests from one upstream registry repository.
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    repository: String,
    /// tag or digest of the top-level manifest
    reference: String,
    image: String,
}

impl UpstreamClient {
    /// Open an image source for a docker-transport reference.
    pub fn new(reference: &ImageReference, ctx: &SystemContext) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(ctx.skip_tls_verify)
            .pool_max_idle_per_host(10)
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        let repository = [reference.namespace.as_str(), reference.repository.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("/");
        let top = if reference.is_digest() {
            reference.digest.clone()
        } else if reference.is_tag() {
            reference.tag.clone()
        } else {
            "latest".to_string()
        };

        Ok(Self {
            client,
            base_url: format!("https://{}", reference.registry),
            repository,
            reference: top,
            image: reference.exact(),
        })
    }

    async fn fetch(&self, reference: &str) -> Result<(Vec<u8>, String)> {
        let url = format!(
            "{}/v2/{}/manifests/{}",
            self.base_url, self.repository, reference
        );
        tracing::debug!(url = %url, "fetching manifest");

        let mut response = self
            .client
            .get(&url)
            .header("Accept", DEFAULT_MANIFEST_ACCEPT_HEADER)
            .send()
            .await?;

        // Anonymous pull flow: a 401 names the token realm in
        // WWW-Authenticate; retry once with the bearer token.
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let www_auth = response
                .headers()
                .get("www-authenticate")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            if let Some(auth_header) = www_auth {
                if let Some(token) = fetch_registry_token(&auth_header, &self.repository).await {
                    response = self
                        .client
                        .get(&url)
                        .header("Accept", DEFAULT_MANIFEST_ACCEPT_HEADER)
                        .bearer_auth(token)
                        .send()
                        .await?;
                } else {
                    tracing::warn!(url = %url, "failed to fetch registry token");
                }
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::ManifestFetch {
                image: self.image.clone(),
                reason: format!("upstream returned {} for {}", status, url),
            });
        }

        let media_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/vnd.docker.distribution.manifest.v2+json")
            .to_string();
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), media_type))
    }
}

#[async_trait]
impl ImageSource for UpstreamClient {
    async fn get_manifest(&self, instance: Option<&str>) -> Result<(Vec<u8>, String)> {
        match instance {
            Some(digest) => self.fetch(digest).await,
            None => self.fetch(&self.reference).await,
        }
    }
}

/// Fetch a pull token for anonymous access.
/// Parses `Bearer realm="...",service="...",scope="..."`, requests the
/// realm URL with those parameters, and accepts either the `token` or
/// `access_token` response field.
pub async fn fetch_registry_token(www_auth: &str, repository: &str) -> Option<String> {
    let auth_str = www_auth.strip_prefix("Bearer ").unwrap_or(www_auth);

    let mut realm = None;
    let mut service = None;
    let mut scope = None;
    for part in auth_str.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("realm=") {
            realm = unquote(value);
        } else if let Some(value) = part.strip_prefix("service=") {
            service = unquote(value);
        } else if let Some(value) = part.strip_prefix("scope=") {
            scope = unquote(value);
        }
    }

    let realm = match realm {
        Some(r) => r,
        None => {
            tracing::warn!("no realm found in WWW-Authenticate header");
            return None;
        }
    };

    let scope = scope.unwrap_or_else(|| format!("repository:{}:pull", repository));
    let mut token_url = format!("{}?scope={}", realm, scope);
    if let Some(service) = service {
        token_url.push_str(&format!("&service={}", service));
    }

    let client = Client::new();
    match client.get(&token_url).send().await {
        Ok(response) if response.status().is_success() => {
            let json: serde_json::Value = response.json().await.ok()?;
            json.get("token")
                .and_then(|t| t.as_str())
                .or_else(|| json.get("access_token").and_then(|t| t.as_str()))
                .map(|t| t.to_string())
        }
        Ok(response) => {
            tracing::warn!(url = %token_url, status = %response.status(), "token request rejected");
            None
        }
        Err(e) => {
            tracing::warn!(url = %token_url, error = %e, "failed to fetch registry token");
            None
        }
    }
}

fn unquote(value: &str) -> Option<String> {
    value
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(|s| s.to_string())
}
