//! Asset references and the media-kind classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inline payload prefixes that carry a binary model container.
const MODEL_PAYLOAD_PREFIXES: &[&str] = &["data:application/octet-stream", "data:model/gltf-binary"];
const VIDEO_PAYLOAD_PREFIX: &str = "data:video";
const IMAGE_PAYLOAD_PREFIX: &str = "data:image";

const MODEL_EXTENSIONS: &[&str] = &["glb"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg"];
const DOCUMENT_EXTENSIONS: &[&str] = &["html"];

/// Opaque string identifying (URI or path) or carrying (`data:` payload) an
/// asset. Replacing the reference triggers re-classification and reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetReference(String);

impl AssetReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the reference embeds its payload instead of pointing at it.
    pub fn is_inline(&self) -> bool {
        starts_with_ignore_case(&self.0, "data:")
    }

    /// Lower-cased extension of the path portion, ignoring any query string
    /// or fragment. Inline payloads have no extension.
    pub fn extension(&self) -> Option<String> {
        if self.is_inline() {
            return None;
        }
        let path = self.0.split(['?', '#']).next().unwrap_or_default();
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or_default();
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() && ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Short label for logs; inline payloads are elided after their header.
    pub fn display_label(&self) -> &str {
        if self.is_inline() {
            self.0.split(',').next().unwrap_or("data:")
        } else {
            &self.0
        }
    }
}

impl fmt::Display for AssetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_label())
    }
}

impl From<&str> for AssetReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssetReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Discriminated media kind derived from an [`AssetReference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Model,
    Video,
    Image,
    Document,
    None,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Video => "video",
            Self::Image => "image",
            Self::Document => "document",
            Self::None => "none",
        }
    }

    /// Kinds that end up as a flat 2-D surface rather than a scene graph.
    pub fn is_surface(self) -> bool {
        matches!(self, Self::Video | Self::Image | Self::Document)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a reference. Total and pure: anything unrecognised is
/// [`MediaKind::None`]. Checks run model, video, image, document in that
/// order and the first match wins.
pub fn classify(reference: &AssetReference) -> MediaKind {
    let raw = reference.as_str();
    let ext = reference.extension();
    let has_ext = |set: &[&str]| ext.as_deref().is_some_and(|ext| set.contains(&ext));

    if MODEL_PAYLOAD_PREFIXES
        .iter()
        .any(|prefix| starts_with_ignore_case(raw, prefix))
        || has_ext(MODEL_EXTENSIONS)
    {
        MediaKind::Model
    } else if starts_with_ignore_case(raw, VIDEO_PAYLOAD_PREFIX) || has_ext(VIDEO_EXTENSIONS) {
        MediaKind::Video
    } else if starts_with_ignore_case(raw, IMAGE_PAYLOAD_PREFIX) || has_ext(IMAGE_EXTENSIONS) {
        MediaKind::Image
    } else if has_ext(DOCUMENT_EXTENSIONS) {
        MediaKind::Document
    } else {
        MediaKind::None
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
