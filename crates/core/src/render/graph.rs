use crate::{
    binding::{CharacterStage, EffectBinding},
    compose::{ComposedFrame, FrameComposer, Viewport},
    effect::DrawingSurfaceId,
    pipeline::{AssetPipeline, PipelineEvent},
    source::{AssetReference, MediaKind},
    store::ConfigStore,
    surface::Dimensions,
    Result,
};

/// Everything one frame produced.
#[derive(Debug)]
pub struct FrameReport {
    pub frame: ComposedFrame,
    pub events: Vec<PipelineEvent>,
}

/// Frame driver wiring the asset pipeline, the composer and the effect
/// binding around a shared [`ConfigStore`].
#[derive(Debug)]
pub struct RenderGraph {
    store: ConfigStore,
    pipeline: AssetPipeline,
    composer: FrameComposer,
    binding: EffectBinding,
}

impl RenderGraph {
    pub fn new(store: ConfigStore, pipeline: AssetPipeline, composer: FrameComposer) -> Self {
        Self {
            binding: EffectBinding::new(store.clone()),
            store,
            pipeline,
            composer,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn pipeline(&self) -> &AssetPipeline {
        &self.pipeline
    }

    pub fn set_asset(&mut self, reference: impl Into<AssetReference>) -> MediaKind {
        self.pipeline.set_asset(reference)
    }

    pub fn attach_surface(&mut self, surface: DrawingSurfaceId) -> Result<bool> {
        self.binding.register_surface(surface)
    }

    pub fn report_surface_dimensions(&mut self, dimensions: Dimensions) -> bool {
        self.pipeline.report_surface_dimensions(dimensions)
    }

    /// Installs finished loads, places the active renderable and feeds the
    /// character stage with the current parameters.
    pub fn frame(
        &mut self,
        viewport: Viewport,
        delta_seconds: f32,
        stage: &mut dyn CharacterStage,
    ) -> Result<FrameReport> {
        let events = self.pipeline.poll();
        let fit = self.store.read(|config| config.fit)?;
        let frame = self
            .composer
            .compose(self.pipeline.active_mut(), viewport, fit, delta_seconds);
        self.binding.forward(viewport, stage)?;
        Ok(FrameReport { frame, events })
    }
}
