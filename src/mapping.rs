use std::collections::HashMap;
use std::path::Path;

use crate::error::{MirrorError, Result};
use crate::mirror::ImageCategory;
use crate::reference::ImageReference;

/// An image reference tagged with its mirror category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedImage {
    pub reference: ImageReference,
    pub category: ImageCategory,
}

impl TypedImage {
    pub fn parse(image: &str, category: ImageCategory) -> Result<Self> {
        Ok(Self {
            reference: ImageReference::parse(image)?,
            category,
        })
    }
}

/// Deduplicated source → destination mapping, keyed by `(reference,
/// category)`. Destination categories are normalized to `Generic` on
/// insert; serialization order is deterministic (sorted by the source's
/// canonical string).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypedImageMapping {
    entries: HashMap<TypedImage, TypedImage>,
}

impl TypedImageMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &TypedImage) -> Option<&TypedImage> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypedImage, &TypedImage)> {
        self.entries.iter()
    }

    /// Insert or overwrite. The destination's category is forced to
    /// `Generic`.
    pub fn add(&mut self, src: ImageReference, dst: ImageReference, category: ImageCategory) {
        self.entries.insert(
            TypedImage {
                reference: src,
                category,
            },
            TypedImage {
                reference: dst,
                category: ImageCategory::Generic,
            },
        );
    }

    /// Delete the entry whose key equals `(reference, category)`.
    pub fn remove(&mut self, reference: &ImageReference, category: ImageCategory) {
        self.entries.remove(&TypedImage {
            reference: reference.clone(),
            category,
        });
    }

    /// Union with `other`, `other` winning on key conflicts.
    pub fn merge(&mut self, other: TypedImageMapping) {
        self.entries.extend(other.entries);
    }

    /// A new mapping holding only the entries whose key category is in
    /// `categories`.
    pub fn by_category(&self, categories: &[ImageCategory]) -> TypedImageMapping {
        let entries = self
            .entries
            .iter()
            .filter(|(key, _)| categories.contains(&key.category))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        TypedImageMapping { entries }
    }

    /// Rewrite every destination onto `registry`, nesting its namespace
    /// under `namespace` and carrying the source's tag and digest over.
    /// Sources are untouched.
    pub fn to_registry(&mut self, registry: &str, namespace: &str) {
        for (src, dst) in self.entries.iter_mut() {
            let joined = [namespace, dst.reference.namespace.as_str()]
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join("/");
            dst.reference.registry = registry.to_string();
            dst.reference.namespace = joined;
            // Tag and digest follow the source so the rewritten
            // destination stays pullable by the same identifier.
            dst.reference.digest = src.reference.digest.clone();
            dst.reference.tag = src.reference.tag.clone();
        }
    }

    /// Write `<src>=<dst>` lines, one per entry, sorted by the source's
    /// canonical string. The write is atomic (temp file + rename).
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut lines: Vec<String> = self
            .entries
            .iter()
            .map(|(src, dst)| format!("{}={}\n", src.reference.exact(), dst.reference.exact()))
            .collect();
        lines.sort();

        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, lines.concat())?;
        std::fs::rename(&temp_path, path)?;
        tracing::debug!(path = %path.display(), entries = self.entries.len(), "wrote image mapping");
        Ok(())
    }

    /// Parse a mapping file. Every non-empty line must split into exactly
    /// two references around `separator`; both sides receive `category`.
    /// An empty file yields an empty mapping.
    pub fn read_from(
        path: impl AsRef<Path>,
        separator: &str,
        category: ImageCategory,
    ) -> Result<TypedImageMapping> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let mut mapping = TypedImageMapping::new();

        for line in data.lines() {
            let mut split = line.split(separator);
            let (src, dst) = match (split.next(), split.next(), split.next()) {
                (Some(src), Some(dst), None) => (src.trim(), dst.trim()),
                _ => {
                    return Err(MirrorError::MalformedMapping {
                        line: line.to_string(),
                        separator: separator.to_string(),
                    })
                }
            };
            let src = ImageReference::parse(src)?;
            let dst = ImageReference::parse(dst)?;
            mapping.entries.insert(
                TypedImage {
                    reference: src,
                    category,
                },
                TypedImage {
                    reference: dst,
                    category,
                },
            );
        }
        Ok(mapping)
    }
}
