//! # Graphics Module
//!
//! Everything that touches the GPU or feeds it: cameras, the spot light, scene geometry,
//! render targets and uniforms, and the RSM pass sequence.
//!
//! ## Architecture Overview
//!
//! - **Camera System** ([`camera`]) - Transforms, projections and flythrough motion
//! - **Light** ([`light`]) - The spot light that casts the reflective shadow map
//! - **Rendering Pipeline** ([`rendering`]) - RSM, GBuffer, direct and indirect lighting
//! - **Scene Management** ([`scene`]) - OBJ meshes split into material sub-meshes
//! - **Resource Management** ([`resources`]) - Render targets, kernels, uniforms and materials
//!
//! ## Usage
//!
//! ```no_run
//! use bounce::{config::AppConfig, gfx::scene::Scene};
//!
//! // The render engine is created by the application once a window exists
//! // let engine = pollster::block_on(RenderEngine::new(window, 1280, 720, &config))?;
//! // let scene = Scene::load_obj(engine.device(), "assets/cornell_box.obj", 10.0)?;
//! ```

pub mod camera;
pub mod light;
pub mod rendering;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use camera::Camera;
pub use light::SpotLight;
pub use rendering::render_engine::RenderEngine;
