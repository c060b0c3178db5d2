use std::{path::PathBuf, sync::Arc, time::Duration};

use asciiscope_core::{
    classify, AppConfig, AssetPipeline, AssetReference, CharacterStage, ConfigStore,
    DrawingSurfaceId, EffectConfig, EffectPatch, FrameComposer, FrameTimer, FsAssetSource,
    GlbParser, KeyEvent, KeyboardRouter, MatrixToggle, Modifiers, ModelLoader, PipelineEvent,
    RenderGraph, SurfaceLoader, ThreadExecutor, Viewport,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> asciiscope_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { reference } => {
            let reference = AssetReference::from(reference);
            println!("{}\t{}", classify(&reference), reference.display_label());
            Ok(())
        }
        Commands::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> asciiscope_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::default(),
    };
    if let Some(root) = args.asset_root {
        config.asset_root = root;
    }
    let viewport = Viewport::new(
        args.width.unwrap_or(config.viewport.width),
        args.height.unwrap_or(config.viewport.height),
        args.dpr.unwrap_or(config.viewport.dpr),
    );

    let store = ConfigStore::try_new(config.effect.clone())?;
    if let Some(path) = &args.patch {
        let patch: EffectPatch = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        store.merge(patch)?;
    }
    if args.stretch {
        store.merge(EffectPatch {
            fit: Some(false),
            ..Default::default()
        })?;
    }

    let source = Arc::new(FsAssetSource::new(&config.asset_root));
    let pipeline = AssetPipeline::new(
        ModelLoader::new(source.clone(), Arc::new(GlbParser)),
        SurfaceLoader::new(source),
        Arc::new(ThreadExecutor),
    );
    let mut graph = RenderGraph::new(store.clone(), pipeline, FrameComposer::new(config.staging));
    graph.attach_surface(DrawingSurfaceId(1))?;

    let mut keyboard = KeyboardRouter::new();
    let toggle = keyboard.install(Box::new(MatrixToggle::new(store, config.repeat_policy)));

    let asset = args
        .asset
        .map(AssetReference::from)
        .unwrap_or_else(|| config.default_asset.clone());
    tracing::info!(%asset, ?viewport, frames = args.frames, "starting headless run");
    graph.set_asset(asset);

    let frame_time = Duration::from_millis(args.frame_ms);
    let mut stage = LoggingStage::default();
    let mut timer = FrameTimer::new();
    for frame in 0..args.frames {
        let elapsed = timer.tick();

        if args.toggle_at.contains(&frame) {
            keyboard.dispatch(&KeyEvent::pressed(MatrixToggle::KEY, Modifiers::SHIFT))?;
            keyboard.dispatch(&KeyEvent::released(MatrixToggle::KEY, Modifiers::SHIFT))?;
        }

        let report = graph.frame(viewport, elapsed, &mut stage)?;
        for event in &report.events {
            if let PipelineEvent::LoadFailed { reference, error } = event {
                tracing::error!(%reference, %error, "asset could not be shown");
            }
        }
        tracing::debug!(
            frame,
            kind = %report.frame.kind,
            transform = ?report.frame.transform,
            camera = ?report.frame.camera.position,
            "frame composed"
        );
        std::thread::sleep(frame_time);
    }

    keyboard.remove(toggle);
    tracing::info!(submitted = stage.submitted, "run finished");
    Ok(())
}

/// Stand-in for the character-mapping effect: logs what it would draw with.
#[derive(Default)]
struct LoggingStage {
    submitted: u64,
    last: Option<EffectConfig>,
}

impl CharacterStage for LoggingStage {
    fn submit(&mut self, params: EffectConfig) {
        self.submitted += 1;
        if self.last.as_ref() != Some(&params) {
            tracing::info!(
                characters = %params.characters,
                granularity = params.granularity,
                matrix_mode = params.matrix_mode,
                fit = params.fit,
                invert = params.invert,
                greyscale = params.greyscale,
                "effect parameters"
            );
        }
        self.last = Some(params);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "ASCII rendering of models, images and video", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the media kind an asset reference resolves to.
    Classify {
        /// Path, URL or `data:` payload.
        reference: String,
    },
    /// Drive the pipeline headlessly for a number of frames.
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Asset to show instead of the configured default.
    #[arg(short, long)]
    asset: Option<String>,
    /// JSON app config.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// JSON effect patch merged after the config is loaded.
    #[arg(short, long)]
    patch: Option<PathBuf>,
    #[arg(long)]
    asset_root: Option<PathBuf>,
    #[arg(short, long, default_value_t = 120)]
    frames: u32,
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,
    #[arg(long)]
    width: Option<f32>,
    #[arg(long)]
    height: Option<f32>,
    #[arg(long)]
    dpr: Option<f32>,
    /// Stretch surfaces to the viewport instead of letterboxing.
    #[arg(long)]
    stretch: bool,
    /// Frames at which a shift+R press is simulated.
    #[arg(long, value_delimiter = ',')]
    toggle_at: Vec<u32>,
}
