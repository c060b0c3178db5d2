use crate::{
    compose::Viewport,
    effect::{DrawingSurfaceId, EffectConfig, EffectPatch},
    store::ConfigStore,
    Result,
};

/// Receiver of the per-frame parameter set: the character-mapping effect.
pub trait CharacterStage {
    fn submit(&mut self, params: EffectConfig);
}

/// Read-and-forward boundary between the store and the character stage.
#[derive(Debug, Clone)]
pub struct EffectBinding {
    store: ConfigStore,
    registered: Option<DrawingSurfaceId>,
}

impl EffectBinding {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store,
            registered: None,
        }
    }

    /// Publishes the drawing surface once it exists. Re-registering the same
    /// handle does nothing; a different handle means a new canvas.
    pub fn register_surface(&mut self, surface: DrawingSurfaceId) -> Result<bool> {
        if self.registered == Some(surface) {
            return Ok(false);
        }
        if let Some(previous) = self.registered {
            tracing::info!(?previous, ?surface, "drawing surface replaced");
        }
        self.store.merge(EffectPatch {
            drawing_surface: Some(surface),
            ..Default::default()
        })?;
        self.registered = Some(surface);
        Ok(true)
    }

    /// Current parameters with granularity scaled to device pixels.
    pub fn frame_params(&self, viewport: Viewport) -> Result<EffectConfig> {
        let mut params = self.store.snapshot()?;
        params.granularity *= viewport.dpr;
        Ok(params)
    }

    pub fn forward(&self, viewport: Viewport, stage: &mut dyn CharacterStage) -> Result<()> {
        stage.submit(self.frame_params(viewport)?);
        Ok(())
    }
}
