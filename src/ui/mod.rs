//! # User Interface Module
//!
//! A Dear ImGui overlay for tuning the renderer at runtime.
//!
//! - [`UiManager`] - ImGui integration with winit and wgpu, input capture and drawing
//! - [`panel`] - The tunables panel: light, indirect lighting and display controls
//!
//! While the UI wants the mouse or keyboard, camera input is not processed.

pub mod manager;
pub mod panel;

// Re-export main types
pub use manager::UiManager;
pub use panel::{tunables_panel, PanelChanges, Tunables};
