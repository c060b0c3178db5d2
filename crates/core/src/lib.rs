//! Core library for the asciiscope viewer.
//!
//! Turns an arbitrary asset reference (binary glTF model, image, video or
//! embedded document) into a framed renderable and keeps the character-mapping
//! stage fed with one consistent parameter set per frame. Loads run off the
//! frame thread; only the most recently selected asset is ever installed.

pub mod assets;
pub mod binding;
pub mod compose;
pub mod config;
pub mod effect;
pub mod error;
pub mod input;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod store;
pub mod surface;
pub mod timeline;

pub use assets::{AssetSource, FsAssetSource, MemoryAssetSource};
pub use binding::{CharacterStage, EffectBinding};
pub use compose::{ComposedFrame, FrameComposer, StagingConfig, Viewport};
pub use config::AppConfig;
pub use effect::{DrawingSurfaceId, EffectConfig, EffectPatch, Rgb};
pub use error::{AsciiscopeError, Result};
pub use input::{Key, KeyEvent, KeyboardRouter, MatrixToggle, Modifiers, RepeatPolicy};
pub use model::{GlbParser, ModelLoader, ModelParser, SceneGraphHandle};
pub use pipeline::{AssetPipeline, InlineExecutor, LoadExecutor, PipelineEvent, ThreadExecutor};
pub use render::{FrameReport, RenderGraph, Renderable, Transform};
pub use source::{classify, AssetReference, MediaKind};
pub use store::ConfigStore;
pub use surface::{Dimensions, SurfaceHandle, SurfaceLoader};
pub use timeline::{AnimationClip, AnimationDriver, FrameTimer};
