//! Asset switching: classification, background loads and stale-result
//! suppression.

use std::sync::{
    mpsc::{self, Receiver, Sender},
    Arc,
};

use crate::{
    model::ModelLoader,
    render::Renderable,
    source::{classify, AssetReference, MediaKind},
    surface::{Dimensions, SurfaceLoader},
    AsciiscopeError, Result,
};

pub type LoadJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs load jobs off the frame thread.
pub trait LoadExecutor: Send + Sync {
    fn spawn(&self, job: LoadJob) -> Result<()>;
}

/// One named OS thread per load.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl LoadExecutor for ThreadExecutor {
    fn spawn(&self, job: LoadJob) -> Result<()> {
        std::thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(job)?;
        Ok(())
    }
}

/// Runs the job on the calling thread. Results still arrive through
/// [`AssetPipeline::poll`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl LoadExecutor for InlineExecutor {
    fn spawn(&self, job: LoadJob) -> Result<()> {
        job();
        Ok(())
    }
}

/// Observable outcome of asset switching, reported by [`AssetPipeline::poll`].
#[derive(Debug)]
pub enum PipelineEvent {
    /// A load finished for the current reference and is now active.
    Installed {
        reference: AssetReference,
        kind: MediaKind,
    },
    /// The reference classified as nothing; the scene is now empty.
    Cleared { reference: AssetReference },
    /// The load for the current reference failed; the previous renderable
    /// (if any) stays active.
    LoadFailed {
        reference: AssetReference,
        error: AsciiscopeError,
    },
    /// A superseded load finished late and was dropped.
    StaleDiscarded {
        reference: AssetReference,
        generation: u64,
    },
}

struct LoadOutcome {
    generation: u64,
    reference: AssetReference,
    result: Result<Renderable>,
}

/// Owns the active renderable and every in-flight load.
///
/// Each [`AssetPipeline::set_asset`] bumps a generation counter; a finished
/// load is installed only if its generation is still current. The previous
/// renderable stays active until its replacement is ready and is retired at
/// the moment of the swap.
pub struct AssetPipeline {
    models: ModelLoader,
    surfaces: SurfaceLoader,
    executor: Arc<dyn LoadExecutor>,
    reference: Option<AssetReference>,
    kind: MediaKind,
    generation: u64,
    loading: bool,
    active: Option<Renderable>,
    events: Vec<PipelineEvent>,
    outcomes_tx: Sender<LoadOutcome>,
    outcomes_rx: Receiver<LoadOutcome>,
}

impl AssetPipeline {
    pub fn new(
        models: ModelLoader,
        surfaces: SurfaceLoader,
        executor: Arc<dyn LoadExecutor>,
    ) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::channel();
        Self {
            models,
            surfaces,
            executor,
            reference: None,
            kind: MediaKind::None,
            generation: 0,
            loading: false,
            active: None,
            events: Vec::new(),
            outcomes_tx,
            outcomes_rx,
        }
    }

    pub fn reference(&self) -> Option<&AssetReference> {
        self.reference.as_ref()
    }

    /// Kind of the current reference (not necessarily of the active
    /// renderable while a load is in flight).
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn active(&self) -> Option<&Renderable> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut Renderable> {
        self.active.as_mut()
    }

    /// Replaces the asset reference and starts loading it. Any load still in
    /// flight becomes stale.
    pub fn set_asset(&mut self, reference: impl Into<AssetReference>) -> MediaKind {
        let reference = reference.into();
        let kind = classify(&reference);
        self.generation += 1;
        self.kind = kind;
        self.reference = Some(reference.clone());
        tracing::info!(%reference, %kind, generation = self.generation, "asset selected");

        if kind == MediaKind::None {
            self.loading = false;
            self.retire_active();
            self.events.push(PipelineEvent::Cleared { reference });
            return kind;
        }

        self.loading = true;
        let job = self.load_job(reference.clone(), kind);
        if let Err(err) = self.executor.spawn(job) {
            self.loading = false;
            self.events.push(PipelineEvent::LoadFailed {
                error: err.into_load(reference.display_label()),
                reference,
            });
        }
        kind
    }

    fn load_job(&self, reference: AssetReference, kind: MediaKind) -> LoadJob {
        let generation = self.generation;
        let models = self.models.clone();
        let surfaces = self.surfaces.clone();
        let outcomes = self.outcomes_tx.clone();
        Box::new(move || {
            let result = match kind {
                MediaKind::Model => models.load(&reference).map(Renderable::Scene),
                _ => surfaces.load(&reference, kind).map(Renderable::Surface),
            };
            let result = result.map_err(|err| err.into_load(reference.display_label()));
            // The pipeline may be gone by now; nothing left to notify.
            let _ = outcomes.send(LoadOutcome {
                generation,
                reference,
                result,
            });
        })
    }

    /// Drains finished loads without blocking and returns everything that
    /// happened since the last call.
    pub fn poll(&mut self) -> Vec<PipelineEvent> {
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            self.settle(outcome);
        }
        std::mem::take(&mut self.events)
    }

    fn settle(&mut self, outcome: LoadOutcome) {
        let LoadOutcome {
            generation,
            reference,
            result,
        } = outcome;

        if generation != self.generation {
            tracing::debug!(%reference, generation, current = self.generation, "stale load discarded");
            if let Ok(mut renderable) = result {
                renderable.retire();
            }
            self.events.push(PipelineEvent::StaleDiscarded {
                reference,
                generation,
            });
            return;
        }

        self.loading = false;
        match result {
            Ok(renderable) => {
                let kind = renderable.kind();
                self.retire_active();
                self.active = Some(renderable);
                tracing::info!(%reference, %kind, "renderable installed");
                self.events.push(PipelineEvent::Installed { reference, kind });
            }
            Err(error) => {
                tracing::warn!(%reference, %error, "asset load failed; keeping previous renderable");
                self.events.push(PipelineEvent::LoadFailed { reference, error });
            }
        }
    }

    /// Late size report for the active surface (embedded documents).
    pub fn report_surface_dimensions(&mut self, dimensions: Dimensions) -> bool {
        match &mut self.active {
            Some(Renderable::Surface(surface)) => surface.report_dimensions(dimensions),
            _ => false,
        }
    }

    fn retire_active(&mut self) {
        if let Some(mut previous) = self.active.take() {
            tracing::debug!(kind = %previous.kind(), "retiring renderable");
            previous.retire();
        }
    }
}

impl std::fmt::Debug for AssetPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetPipeline")
            .field("reference", &self.reference)
            .field("kind", &self.kind)
            .field("generation", &self.generation)
            .field("loading", &self.loading)
            .field("active", &self.active.as_ref().map(Renderable::kind))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::{
        assets::MemoryAssetSource,
        model::{glb::fixtures as gltf_fixtures, GlbParser, Material},
        surface::fixtures,
    };

    /// Holds jobs until the test decides which one finishes.
    #[derive(Clone, Default)]
    struct ManualExecutor {
        jobs: Arc<Mutex<Vec<Option<LoadJob>>>>,
    }

    impl ManualExecutor {
        fn run(&self, index: usize) {
            let job = self.jobs.lock().unwrap()[index].take().expect("job already ran");
            job();
        }
    }

    impl LoadExecutor for ManualExecutor {
        fn spawn(&self, job: LoadJob) -> Result<()> {
            self.jobs.lock().unwrap().push(Some(job));
            Ok(())
        }
    }

    fn globe_glb() -> Vec<u8> {
        gltf_fixtures::glb(&gltf_fixtures::document(
            json!({
                "scenes": [{ "nodes": [0] }],
                "nodes": [
                    { "name": "Globe", "children": [1, 2] },
                    { "name": "Land", "mesh": 0 },
                    { "name": "Shield", "mesh": 0, "extras": { "Occlude": true } }
                ],
                "meshes": [gltf_fixtures::mesh()],
                "animations": [gltf_fixtures::animation(Some("Turn"), &[2])]
            }),
            &[6.0],
        ))
    }

    fn assets() -> MemoryAssetSource {
        MemoryAssetSource::new()
            .with("global-big.glb", globe_glb())
            .with("photo.png", fixtures::png_bytes(800, 400))
            .with("clip.mp4", fixtures::mp4_bytes(1280, 720))
            .with("broken.png", b"not an image".to_vec())
    }

    fn pipeline(executor: Arc<dyn LoadExecutor>) -> AssetPipeline {
        let source: Arc<MemoryAssetSource> = Arc::new(assets());
        AssetPipeline::new(
            ModelLoader::new(source.clone(), Arc::new(GlbParser)),
            SurfaceLoader::new(source),
            executor,
        )
    }

    fn active_kind(pipeline: &AssetPipeline) -> Option<MediaKind> {
        pipeline.active().map(Renderable::kind)
    }

    #[test]
    fn late_model_never_overrides_newer_image() {
        let executor = ManualExecutor::default();
        let mut pipeline = pipeline(Arc::new(executor.clone()));

        pipeline.set_asset("global-big.glb");
        pipeline.set_asset("photo.png");

        executor.run(0);
        executor.run(1);
        let events = pipeline.poll();

        assert!(matches!(events[0], PipelineEvent::StaleDiscarded { generation: 1, .. }));
        assert!(matches!(events[1], PipelineEvent::Installed { kind: MediaKind::Image, .. }));
        assert_eq!(active_kind(&pipeline), Some(MediaKind::Image));
    }

    #[test]
    fn image_first_then_late_model_keeps_image() {
        let executor = ManualExecutor::default();
        let mut pipeline = pipeline(Arc::new(executor.clone()));

        pipeline.set_asset("global-big.glb");
        pipeline.set_asset("photo.png");

        executor.run(1);
        pipeline.poll();
        assert_eq!(active_kind(&pipeline), Some(MediaKind::Image));

        executor.run(0);
        let events = pipeline.poll();
        assert!(matches!(events[..], [PipelineEvent::StaleDiscarded { .. }]));
        assert_eq!(active_kind(&pipeline), Some(MediaKind::Image));
        assert!(!pipeline.is_loading());
    }

    #[test]
    fn previous_renderable_stays_until_replacement_is_ready() {
        let executor = ManualExecutor::default();
        let mut pipeline = pipeline(Arc::new(executor.clone()));

        pipeline.set_asset("clip.mp4");
        executor.run(0);
        pipeline.poll();

        pipeline.set_asset("photo.png");
        assert!(pipeline.poll().is_empty());
        assert_eq!(active_kind(&pipeline), Some(MediaKind::Video));
        assert!(pipeline.is_loading());

        executor.run(1);
        pipeline.poll();
        assert_eq!(active_kind(&pipeline), Some(MediaKind::Image));
    }

    #[test]
    fn default_model_gets_materials_from_metadata() {
        let mut pipeline = pipeline(Arc::new(InlineExecutor));
        pipeline.set_asset("global-big.glb");
        pipeline.poll();

        let Some(Renderable::Scene(scene)) = pipeline.active() else {
            panic!("expected the model to be active");
        };
        let mut materials = Vec::new();
        scene.root.walk(&mut |node| {
            if node.is_mesh {
                materials.push((node.has_tag("occlude"), node.material));
            }
        });
        assert_eq!(materials.len(), 2);
        for (occluder, material) in materials {
            let expected = if occluder {
                Material::OcclusionMask
            } else {
                Material::NormalEncoding
            };
            assert_eq!(material, Some(expected));
        }
    }

    #[test]
    fn failed_load_keeps_previous_renderable() {
        let mut pipeline = pipeline(Arc::new(InlineExecutor));
        pipeline.set_asset("photo.png");
        pipeline.poll();

        pipeline.set_asset("broken.png");
        let events = pipeline.poll();

        assert!(matches!(
            &events[..],
            [PipelineEvent::LoadFailed { error: AsciiscopeError::Load { .. }, .. }]
        ));
        assert_eq!(active_kind(&pipeline), Some(MediaKind::Image));
    }

    #[test]
    fn unknown_reference_clears_and_invalidates_in_flight_loads() {
        let executor = ManualExecutor::default();
        let mut pipeline = pipeline(Arc::new(executor.clone()));

        pipeline.set_asset("clip.mp4");
        executor.run(0);
        pipeline.poll();

        pipeline.set_asset("photo.png");
        assert_eq!(pipeline.set_asset("readme.txt"), MediaKind::None);
        assert!(pipeline.active().is_none());

        executor.run(1);
        let events = pipeline.poll();
        assert!(matches!(events[0], PipelineEvent::Cleared { .. }));
        assert!(matches!(events[1], PipelineEvent::StaleDiscarded { .. }));
        assert!(pipeline.active().is_none());
    }

    #[test]
    fn stale_results_are_retired_not_installed() {
        let executor = ManualExecutor::default();
        let mut pipeline = pipeline(Arc::new(executor.clone()));

        pipeline.set_asset("clip.mp4");
        pipeline.set_asset("global-big.glb");
        executor.run(1);
        executor.run(0);

        let events = pipeline.poll();
        assert!(matches!(events[0], PipelineEvent::Installed { kind: MediaKind::Model, .. }));
        assert!(matches!(events[1], PipelineEvent::StaleDiscarded { generation: 1, .. }));
        let Some(Renderable::Scene(scene)) = pipeline.active() else {
            panic!("expected the model to stay active");
        };
        assert!(!scene.driver.is_stopped());
    }

    #[test]
    fn thread_executor_delivers_through_poll() {
        let mut pipeline = pipeline(Arc::new(ThreadExecutor));
        pipeline.set_asset("photo.png");

        let mut installed = false;
        for _ in 0..200 {
            if pipeline
                .poll()
                .iter()
                .any(|event| matches!(event, PipelineEvent::Installed { .. }))
            {
                installed = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(installed);
        assert_eq!(
            pipeline.active().and_then(Renderable::dimensions),
            Some(Dimensions::new(800, 400))
        );
    }

    #[test]
    fn documents_accept_late_dimension_reports() {
        let mut pipeline = pipeline(Arc::new(InlineExecutor));
        assert!(!pipeline.report_surface_dimensions(Dimensions::new(10, 10)));

        pipeline.set_asset("embed/page.html");
        pipeline.poll();
        assert_eq!(pipeline.active().and_then(Renderable::dimensions), None);
        assert!(pipeline.report_surface_dimensions(Dimensions::new(1024, 768)));
        assert_eq!(
            pipeline.active().and_then(Renderable::dimensions),
            Some(Dimensions::new(1024, 768))
        );
    }
}
