use std::fmt;
use std::str::FromStr;

use crate::error::{MirrorError, Result};

/// Transport of an image reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transport {
    #[default]
    Docker,
    Oci,
    File,
    Dir,
}

impl Transport {
    pub fn as_scheme(&self) -> &'static str {
        match self {
            Transport::Docker => "docker://",
            Transport::Oci => "oci://",
            Transport::File => "file://",
            Transport::Dir => "dir://",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Docker => "docker",
            Transport::Oci => "oci",
            Transport::File => "file",
            Transport::Dir => "dir",
        }
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "docker" => Ok(Transport::Docker),
            "oci" => Ok(Transport::Oci),
            "file" => Ok(Transport::File),
            "dir" => Ok(Transport::Dir),
            _ => Err(format!("unknown transport: {}", s)),
        }
    }
}

/// A parsed image reference.
///
/// Empty strings mean "unset". A reference may carry a tag, a digest, or
/// both (`name:tag@sha256:...`); neither means `latest` semantics at pull
/// time. Non-docker transports keep their whole path in `repository`, so
/// `oci:///tmp/catalog` survives a round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ImageReference {
    pub transport: Transport,
    pub registry: String,
    /// May contain `/` for nested namespaces
    pub namespace: String,
    pub repository: String,
    pub tag: String,
    /// Full digest including the algorithm prefix, e.g. `sha256:abc...`
    pub digest: String,
}

impl ImageReference {
    /// Parse an image reference string. Accepted schemes are `docker://`,
    /// `oci://`, `file://`, `dir://`; the bare `oci:` / `file:` path forms
    /// (no `//`) are also accepted. A missing scheme defaults to docker.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MirrorError::InvalidReference {
                reference: input.to_string(),
                reason: "empty reference".to_string(),
            });
        }

        let (transport, rest) = split_scheme(trimmed);

        if rest.is_empty() {
            return Err(MirrorError::InvalidReference {
                reference: input.to_string(),
                reason: "reference has no path".to_string(),
            });
        }

        match transport {
            Transport::Docker => parse_docker_path(input, rest),
            _ => parse_local_path(input, transport, rest),
        }
    }

    /// Canonical string form. `parse(exact(r)) == r` holds for any parser
    /// output.
    pub fn exact(&self) -> String {
        let mut out = String::from(self.transport.as_scheme());
        out.push_str(&self.name());
        if !self.tag.is_empty() {
            out.push(':');
            out.push_str(&self.tag);
        }
        if !self.digest.is_empty() {
            out.push('@');
            out.push_str(&self.digest);
        }
        out
    }

    /// The reference path without transport, tag, or digest:
    /// `registry/namespace/repository`, skipping empty components.
    pub fn name(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if !self.registry.is_empty() {
            parts.push(self.registry.as_str());
        }
        if !self.namespace.is_empty() {
            parts.push(self.namespace.as_str());
        }
        if !self.repository.is_empty() {
            parts.push(self.repository.as_str());
        }
        parts.join("/")
    }

    pub fn is_digest(&self) -> bool {
        !self.digest.is_empty()
    }

    pub fn is_tag(&self) -> bool {
        !self.tag.is_empty()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.exact())
    }
}

/// True when a tag value is really a bare digest (64 hex chars). Such tags
/// must be preserved as tags, never rewritten into a digest.
pub fn is_digest_tag(tag: &str) -> bool {
    tag.len() == 64 && tag.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Split `registry`, `namespace`, `repository`, `tag`, `digest` out of an
/// image name, tolerating any known scheme prefix. The first path segment
/// is the registry, the last is `repository[:tag|@digest]`, everything
/// between is the namespace.
pub fn parse_image_name(image: &str) -> (String, String, String, String, String) {
    let trimmed = crate::config::trim_protocol(image.trim());
    let trimmed = trimmed.trim_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();

    let (registry, namespace, last) = match segments.len() {
        0 => return Default::default(),
        1 => (String::new(), String::new(), segments[0]),
        2 => (segments[0].to_string(), String::new(), segments[1]),
        n => (
            segments[0].to_string(),
            segments[1..n - 1].join("/"),
            segments[n - 1],
        ),
    };

    let (repository, tag, digest) = split_suffix(last);
    (registry, namespace, repository, tag, digest)
}

fn split_scheme(input: &str) -> (Transport, &str) {
    for (prefix, transport) in [
        ("docker:", Transport::Docker),
        ("oci:", Transport::Oci),
        ("file:", Transport::File),
        ("dir:", Transport::Dir),
    ] {
        if let Some(rest) = input.strip_prefix(prefix) {
            // `oci:/path` and `oci://path` both denote the same path
            return (transport, rest.strip_prefix("//").unwrap_or(rest));
        }
    }
    (Transport::Docker, input)
}

/// Split `repository[:tag][@digest]` in the last path component.
fn split_suffix(last: &str) -> (String, String, String) {
    let (name_part, digest) = match last.split_once('@') {
        Some((name, digest)) => (name, digest.to_string()),
        None => (last, String::new()),
    };
    match name_part.split_once(':') {
        Some((repo, tag)) => (repo.to_string(), tag.to_string(), digest),
        None => (name_part.to_string(), String::new(), digest),
    }
}

fn validate_digest(input: &str, digest: &str) -> Result<()> {
    let valid = match digest.split_once(':') {
        Some((algo, hex)) => {
            !algo.is_empty()
                && algo.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
                && hex.len() >= 32
                && hex.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MirrorError::InvalidReference {
            reference: input.to_string(),
            reason: format!("invalid digest {:?}", digest),
        })
    }
}

fn parse_docker_path(input: &str, rest: &str) -> Result<ImageReference> {
    let rest = rest.trim_matches('/');
    if rest.is_empty() {
        return Err(MirrorError::InvalidReference {
            reference: input.to_string(),
            reason: "reference has no path".to_string(),
        });
    }

    let segments: Vec<&str> = rest.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(MirrorError::InvalidReference {
            reference: input.to_string(),
            reason: "empty path segment".to_string(),
        });
    }

    let (registry, namespace, last) = match segments.len() {
        1 => (String::new(), String::new(), segments[0]),
        2 => (segments[0].to_string(), String::new(), segments[1]),
        n => (
            segments[0].to_string(),
            segments[1..n - 1].join("/"),
            segments[n - 1],
        ),
    };

    // A tag separator after `@` would put the tag inside the digest, so
    // the only accepted shape with both is `repository:tag@algo:hex`;
    // anything else fails digest validation below.
    let (repository, tag, digest) = split_suffix(last);
    if !digest.is_empty() {
        validate_digest(input, &digest)?;
    }
    if repository.is_empty() {
        return Err(MirrorError::InvalidReference {
            reference: input.to_string(),
            reason: "missing repository".to_string(),
        });
    }

    Ok(ImageReference {
        transport: Transport::Docker,
        registry,
        namespace,
        repository,
        tag,
        digest,
    })
}

/// oci/file/dir references address a path on disk; the path stays whole in
/// `repository` so exact() reproduces it.
fn parse_local_path(input: &str, transport: Transport, rest: &str) -> Result<ImageReference> {
    let (repository, tag, digest) = match rest.rsplit_once('/') {
        Some((dir, last)) => {
            let (repo, tag, digest) = split_suffix(last);
            (format!("{}/{}", dir, repo), tag, digest)
        }
        None => split_suffix(rest),
    };
    if !digest.is_empty() {
        validate_digest(input, &digest)?;
    }

    Ok(ImageReference {
        transport,
        registry: String::new(),
        namespace: String::new(),
        repository,
        tag,
        digest,
    })
}
