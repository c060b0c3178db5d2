use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use base64::Engine as _;

use crate::{source::AssetReference, AsciiscopeError, Result};

/// Delivers the raw bytes behind an [`AssetReference`]. Hosting and transport
/// live outside the core; this trait is the seam loaders fetch through.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, reference: &AssetReference) -> Result<Vec<u8>>;
}

/// Resolves references against a directory on disk. Inline `data:` payloads
/// are decoded in place and never touch the filesystem.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &AssetReference) -> PathBuf {
        let raw = reference.as_str();
        let path = raw.split(['?', '#']).next().unwrap_or(raw);
        let path = path.strip_prefix("file://").unwrap_or(path);
        // Leading slashes are web-root relative, so they map onto `root`.
        self.root.join(path.trim_start_matches('/'))
    }
}

impl AssetSource for FsAssetSource {
    fn fetch(&self, reference: &AssetReference) -> Result<Vec<u8>> {
        if reference.is_inline() {
            return decode_inline_payload(reference);
        }
        let path = self.resolve(reference);
        tracing::debug!(path = %path.display(), "reading asset from disk");
        std::fs::read(&path).map_err(|err| AsciiscopeError::load(reference.as_str(), err))
    }
}

/// In-memory registry of assets, keyed by the literal reference string.
#[derive(Debug, Default, Clone)]
pub struct MemoryAssetSource {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.assets.insert(reference.into(), bytes);
    }

    pub fn with(mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(reference, bytes);
        self
    }
}

impl AssetSource for MemoryAssetSource {
    fn fetch(&self, reference: &AssetReference) -> Result<Vec<u8>> {
        if let Some(bytes) = self.assets.get(reference.as_str()) {
            return Ok(bytes.clone());
        }
        if reference.is_inline() {
            return decode_inline_payload(reference);
        }
        Err(AsciiscopeError::load(
            reference.as_str(),
            "asset is not registered",
        ))
    }
}

/// Decodes `data:[<media type>][;base64],<data>`. Non-base64 payloads are
/// taken verbatim.
pub fn decode_inline_payload(reference: &AssetReference) -> Result<Vec<u8>> {
    let raw = reference.as_str();
    let (header, data) = raw
        .split_once(',')
        .ok_or_else(|| AsciiscopeError::load(raw_label(reference), "inline payload has no data"))?;

    let is_base64 = header
        .rsplit(';')
        .next()
        .is_some_and(|token| token.eq_ignore_ascii_case("base64"));

    if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|err| AsciiscopeError::load(raw_label(reference), err))
    } else {
        Ok(data.as_bytes().to_vec())
    }
}

fn raw_label(reference: &AssetReference) -> String {
    reference.display_label().to_string()
}
