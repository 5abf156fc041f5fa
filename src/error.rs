//! Renderer errors
//!
//! Everything here is fatal: it aborts startup or a resize with a diagnostic. Recoverable
//! conditions (a lost surface, an undeclared uniform) never surface as errors.

use crate::gfx::{
    rendering::passes::{PassId, PassOrderError},
    resources::registry::TargetId,
};

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("Failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("No suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("Failed to acquire device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("Surface is not supported by the adapter")]
    UnsupportedSurface,

    #[error("Shader '{label}' failed to compile: {message}")]
    ShaderCompile { label: String, message: String },

    #[error("Failed to load mesh '{path}': {source}")]
    MeshLoad {
        path: String,
        #[source]
        source: tobj::LoadError,
    },

    #[error("Failed to allocate '{label}': {message}")]
    Allocation { label: String, message: String },

    #[error(transparent)]
    PassOrder(#[from] PassOrderError),

    #[error("Render target {0:?} is not allocated")]
    MissingTarget(TargetId),

    #[error("No pipeline registered for the {0} pass")]
    MissingPipeline(PassId),
}
