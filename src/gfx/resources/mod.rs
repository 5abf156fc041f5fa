// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Handles render targets, static lookup textures, uniform buffers and bind groups.

pub mod capture;
pub mod global_bindings;
pub mod kernels;
pub mod material;
pub mod registry;
pub mod texture_resource;

// Re-export main types
pub use capture::{CaptureError, TargetImage, SAVEABLE_TARGETS};
pub use global_bindings::{FrameUniforms, GlobalUniforms, ObjectUniforms};
pub use kernels::DitherPattern;
pub use material::{Material, MaterialBindings, MaterialId, MaterialLibrary};
pub use registry::{ResourceRegistry, TargetId, TargetSizing};
pub use texture_resource::TextureResource;
