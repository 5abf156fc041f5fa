// src/lib.rs
//! Bounce
//!
//! A real-time renderer approximating single-bounce global illumination with reflective
//! shadow maps, built on wgpu and winit.

pub mod app;
pub mod config;
pub mod error;
pub mod gfx;
pub mod ui;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::BounceApp;
pub use config::AppConfig;
pub use error::RenderError;

/// Creates an application for `config` and runs it until the window closes
pub fn run(config: AppConfig) -> anyhow::Result<()> {
    BounceApp::new(config)?.run()
}
