use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    compose::{StagingConfig, Viewport},
    effect::EffectConfig,
    input::RepeatPolicy,
    source::AssetReference,
    Result,
};

/// Asset shown when nothing else is selected.
pub const DEFAULT_ASSET: &str = "global-big.glb";

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory relative asset references resolve against.
    pub asset_root: PathBuf,
    pub default_asset: AssetReference,
    pub viewport: Viewport,
    pub staging: StagingConfig,
    pub repeat_policy: RepeatPolicy,
    pub effect: EffectConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            default_asset: AssetReference::from(DEFAULT_ASSET),
            viewport: Viewport::default(),
            staging: StagingConfig::default(),
            repeat_policy: RepeatPolicy::default(),
            effect: EffectConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads a JSON config file. Missing keys keep their defaults; effect
    /// values must pass [`EffectConfig::validate`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.effect.characters = config.effect.characters.to_uppercase();
        config.effect.validate()?;
        tracing::debug!(path = %path.display(), "loaded app config");
        Ok(config)
    }
}
