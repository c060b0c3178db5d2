//! Parameters consumed by the character-mapping stage.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{AsciiscopeError, Result};

/// Glyph ramp shipped as the default, darkest to brightest.
pub const DEFAULT_CHARACTERS: &str = " *,    ./O#RL";

/// `#rrggbb` colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Rgb {
    type Err = AsciiscopeError;

    fn from_str(value: &str) -> Result<Self> {
        let hex = value
            .trim()
            .strip_prefix('#')
            .ok_or(AsciiscopeError::InvalidInput("colours must start with `#`"))?;
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or(AsciiscopeError::InvalidInput("colours must be #rrggbb hex"))
        };
        if hex.len() != 6 {
            return Err(AsciiscopeError::InvalidInput("colours must be #rrggbb hex"));
        }
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = AsciiscopeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Opaque handle to the output drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawingSurfaceId(pub u64);

/// Opaque handle to a pre-rendered glyph atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlyphAtlasId(pub u64);

/// Full parameter set of the character-mapping effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectConfig {
    /// Glyph ramp, always upper-case.
    pub characters: String,
    /// Cell size in CSS pixels.
    pub granularity: f32,
    pub characters_limit: u32,
    /// Glyph size used when rasterising the atlas.
    pub font_size: u32,
    pub fill_pixels: bool,
    /// `None` keeps the source colour.
    pub color: Option<Rgb>,
    pub background: Rgb,
    pub greyscale: bool,
    pub invert: bool,
    pub matrix_mode: bool,
    pub fit: bool,
    /// `None` leaves the effect unanimated.
    pub time: Option<f32>,
    #[serde(skip)]
    pub drawing_surface: Option<DrawingSurfaceId>,
    #[serde(skip)]
    pub characters_texture: Option<GlyphAtlasId>,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            characters: DEFAULT_CHARACTERS.to_uppercase(),
            granularity: 8.0,
            characters_limit: 16,
            font_size: 72,
            fill_pixels: false,
            color: Some(Rgb::new(0xff, 0xff, 0xff)),
            background: Rgb::new(0xcd, 0x9b, 0xff),
            greyscale: false,
            invert: false,
            matrix_mode: false,
            fit: true,
            time: None,
            drawing_surface: None,
            characters_texture: None,
        }
    }
}

impl EffectConfig {
    /// Holds a full config to the same rules as [`EffectPatch::validate`].
    pub fn validate(&self) -> Result<()> {
        EffectPatch {
            characters: Some(self.characters.clone()),
            granularity: Some(self.granularity),
            characters_limit: Some(self.characters_limit),
            font_size: Some(self.font_size),
            ..Default::default()
        }
        .validate()
    }
}

/// Partial update of [`EffectConfig`]. Absent fields are left alone; for
/// optional fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EffectPatch {
    pub characters: Option<String>,
    pub granularity: Option<f32>,
    pub characters_limit: Option<u32>,
    pub font_size: Option<u32>,
    pub fill_pixels: Option<bool>,
    #[serde(deserialize_with = "present")]
    pub color: Option<Option<Rgb>>,
    pub background: Option<Rgb>,
    pub greyscale: Option<bool>,
    pub invert: Option<bool>,
    pub matrix_mode: Option<bool>,
    pub fit: Option<bool>,
    #[serde(deserialize_with = "present")]
    pub time: Option<Option<f32>>,
    #[serde(skip)]
    pub drawing_surface: Option<DrawingSurfaceId>,
    #[serde(skip)]
    pub characters_texture: Option<GlyphAtlasId>,
}

/// Keeps an explicit `null` distinct from a missing key.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

macro_rules! merge_fields {
    ($config:expr, $patch:expr, $changed:ident; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                if $config.$field != value {
                    $config.$field = value;
                    $changed = true;
                }
            }
        )+
    };
}

impl EffectPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Rejects values the effect cannot render. Checked before anything is
    /// applied so a bad patch changes nothing.
    pub fn validate(&self) -> Result<()> {
        if let Some(granularity) = self.granularity {
            if !(granularity.is_finite() && granularity > 0.0) {
                return Err(AsciiscopeError::InvalidInput("granularity must be positive"));
            }
        }
        if self.characters_limit == Some(0) {
            return Err(AsciiscopeError::InvalidInput(
                "characters limit must be positive",
            ));
        }
        if self.font_size == Some(0) {
            return Err(AsciiscopeError::InvalidInput("font size must be positive"));
        }
        if self.characters.as_deref().is_some_and(str::is_empty) {
            return Err(AsciiscopeError::InvalidInput("characters must not be empty"));
        }
        Ok(())
    }

    /// Writes every present field into `config`. Returns whether any value
    /// actually changed.
    pub fn apply_to(self, config: &mut EffectConfig) -> bool {
        let mut changed = false;
        let characters = self.characters.as_deref().map(str::to_uppercase);
        if let Some(characters) = characters {
            if config.characters != characters {
                config.characters = characters;
                changed = true;
            }
        }
        merge_fields!(config, self, changed;
            granularity,
            characters_limit,
            font_size,
            fill_pixels,
            color,
            background,
            greyscale,
            invert,
            matrix_mode,
            fit,
            time,
        );
        if let Some(surface) = self.drawing_surface {
            if config.drawing_surface != Some(surface) {
                config.drawing_surface = Some(surface);
                changed = true;
            }
        }
        if let Some(atlas) = self.characters_texture {
            if config.characters_texture != Some(atlas) {
                config.characters_texture = Some(atlas);
                changed = true;
            }
        }
        changed
    }
}
