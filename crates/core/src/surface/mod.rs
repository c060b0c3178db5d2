//! Flat pixel surfaces for video, image and embedded-document assets.

mod probe;

use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::{
    assets::AssetSource,
    render::Transform,
    source::{AssetReference, MediaKind},
    AsciiscopeError, Result,
};

pub use probe::{ContainerProbe, IsoBmffProbe, MatroskaProbe, VideoProbe};

/// Natural pixel size of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Element flags for a background video source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    pub muted: bool,
    pub plays_inline: bool,
    pub looping: bool,
    pub autoplay: bool,
    pub cross_origin_anonymous: bool,
}

impl PlaybackSettings {
    /// Silent, inline, looping autoplay.
    pub fn background_loop() -> Self {
        Self {
            muted: true,
            plays_inline: true,
            looping: true,
            autoplay: true,
            cross_origin_anonymous: true,
        }
    }
}

/// Hidden video element backing a video surface. Frame decoding is done by
/// the host; this tracks configuration, playback and metadata readiness.
#[derive(Debug, Clone)]
pub struct VideoElement {
    settings: PlaybackSettings,
    playing: bool,
    metadata: Option<Dimensions>,
}

impl VideoElement {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            settings,
            playing: false,
            metadata: None,
        }
    }

    pub fn settings(&self) -> PlaybackSettings {
        self.settings
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn metadata(&self) -> Option<Dimensions> {
        self.metadata
    }

    /// Records loaded metadata. Returns `true` only on the first call; later
    /// notifications (e.g. from loop restarts) are ignored.
    pub fn on_loaded_metadata(&mut self, dimensions: Dimensions) -> bool {
        if self.metadata.is_some() {
            return false;
        }
        self.metadata = Some(dimensions);
        if self.settings.autoplay {
            self.playing = true;
        }
        true
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }
}

/// Embedded document shown through a frame. Its rendered size is reported by
/// the embedding host, possibly late or never.
#[derive(Debug, Clone, Default)]
pub struct DocumentFrame {
    reported: Option<Dimensions>,
    attached: bool,
}

impl DocumentFrame {
    pub fn new() -> Self {
        Self {
            reported: None,
            attached: true,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

/// What a surface draws from.
#[derive(Debug, Clone)]
pub enum SurfaceContent {
    Video(VideoElement),
    Image(RgbaImage),
    Document(DocumentFrame),
}

/// A loaded 2-D surface.
#[derive(Debug, Clone)]
pub struct SurfaceHandle {
    pub reference: AssetReference,
    pub content: SurfaceContent,
    pub transform: Transform,
}

impl SurfaceHandle {
    pub fn kind(&self) -> MediaKind {
        match self.content {
            SurfaceContent::Video(_) => MediaKind::Video,
            SurfaceContent::Image(_) => MediaKind::Image,
            SurfaceContent::Document(_) => MediaKind::Document,
        }
    }

    /// Natural size, or `None` until the underlying media has reported it.
    pub fn dimensions(&self) -> Option<Dimensions> {
        match &self.content {
            SurfaceContent::Video(video) => video.metadata(),
            SurfaceContent::Image(pixels) if pixels.width() > 0 => {
                Some(Dimensions::new(pixels.width(), pixels.height()))
            }
            SurfaceContent::Image(_) => None,
            SurfaceContent::Document(frame) => frame.reported,
        }
    }

    /// Late size report from the embedding host. Only documents accept
    /// repeated reports; returns whether the dimensions changed.
    pub fn report_dimensions(&mut self, dimensions: Dimensions) -> bool {
        if dimensions.is_empty() {
            return false;
        }
        match &mut self.content {
            SurfaceContent::Document(frame) => {
                let changed = frame.reported != Some(dimensions);
                frame.reported = Some(dimensions);
                changed
            }
            SurfaceContent::Video(video) => video.on_loaded_metadata(dimensions),
            SurfaceContent::Image(_) => false,
        }
    }

    /// Stops playback and drops pixel data.
    pub fn retire(&mut self) {
        match &mut self.content {
            SurfaceContent::Video(video) => video.stop(),
            SurfaceContent::Image(pixels) => *pixels = RgbaImage::new(0, 0),
            SurfaceContent::Document(frame) => frame.attached = false,
        }
    }
}

/// Produces surfaces for video, image and document references.
#[derive(Clone)]
pub struct SurfaceLoader {
    source: Arc<dyn AssetSource>,
    probe: Arc<dyn VideoProbe>,
}

impl SurfaceLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self::with_probe(source, Arc::new(ContainerProbe))
    }

    pub fn with_probe(source: Arc<dyn AssetSource>, probe: Arc<dyn VideoProbe>) -> Self {
        Self { source, probe }
    }

    /// Blocking load, run on a load executor. Decode and metadata failures
    /// come back as [`AsciiscopeError::Load`].
    pub fn load(&self, reference: &AssetReference, kind: MediaKind) -> Result<SurfaceHandle> {
        let content = match kind {
            MediaKind::Video => SurfaceContent::Video(self.open_video(reference)?),
            MediaKind::Image => SurfaceContent::Image(self.decode_image(reference)?),
            MediaKind::Document => SurfaceContent::Document(DocumentFrame::new()),
            MediaKind::Model | MediaKind::None => {
                return Err(AsciiscopeError::load(
                    reference.display_label(),
                    format!("{kind} references have no flat surface"),
                ))
            }
        };
        let surface = SurfaceHandle {
            reference: reference.clone(),
            content,
            transform: Transform::default(),
        };
        tracing::debug!(%reference, %kind, dimensions = ?surface.dimensions(), "surface ready");
        Ok(surface)
    }

    fn open_video(&self, reference: &AssetReference) -> Result<VideoElement> {
        let mut element = VideoElement::new(PlaybackSettings::background_loop());
        let bytes = self.source.fetch(reference)?;
        let dimensions = self
            .probe
            .probe(&bytes)
            .map_err(|err| err.into_load(reference.display_label()))?;
        element.on_loaded_metadata(dimensions);
        Ok(element)
    }

    fn decode_image(&self, reference: &AssetReference) -> Result<RgbaImage> {
        let bytes = self.source.fetch(reference)?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| AsciiscopeError::load(reference.display_label(), err))?;
        Ok(decoded.to_rgba8())
    }
}

impl std::fmt::Debug for SurfaceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceLoader").finish()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbaImage};

    pub use super::probe::fixtures::{mp4_bytes, webm_bytes};

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::new(width, height))
            .write_to(&mut bytes, ImageFormat::Png)
            .expect("png fixture encodes");
        bytes.into_inner()
    }
}
