// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! Pass descriptors and frame plans, shader programs, pipelines and frame rendering.

pub mod passes;
pub mod pipeline_manager;
pub mod program;
pub mod render_engine;
pub mod render_pass_ext;
pub mod settings;

// Re-export main types
pub use passes::{CompositeTarget, FramePlan, LightingMode, PassExecutor, PassSchedule};
pub use pipeline_manager::{PipelineConfig, PipelineManager, PipelineStats};
pub use program::{ProgramId, ProgramParams};
pub use render_engine::RenderEngine;
pub use settings::LightingSettings;
