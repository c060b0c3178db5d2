/// Result alias that carries the custom [`AsciiscopeError`] type.
pub type Result<T> = std::result::Result<T, AsciiscopeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum AsciiscopeError {
    /// Free-form message for failures without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Raster decode failure reported by the `image` crate.
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    /// Malformed JSON in a config file, patch file or model container.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// Model container rejected by the `gltf` reader.
    #[error("invalid glTF: {0}")]
    Gltf(#[from] gltf::Error),
    /// Caller supplied a value the operation cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Fetching, decoding or parsing an asset failed. Never fatal: the
    /// previously active renderable stays on screen.
    #[error("failed to load `{reference}`: {reason}")]
    Load { reference: String, reason: String },
    /// A shared lock was poisoned by a panicking holder.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
}

impl AsciiscopeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Wraps any displayable failure as a load failure for `reference`.
    pub fn load(reference: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Load {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    /// Re-tags an arbitrary error as a load failure, keeping existing load
    /// failures untouched.
    pub fn into_load(self, reference: &str) -> Self {
        match self {
            load @ Self::Load { .. } => load,
            other => Self::load(reference, other),
        }
    }
}

impl From<&str> for AsciiscopeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for AsciiscopeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
