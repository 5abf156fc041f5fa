pub mod camera_controller;
pub mod motion;
pub mod projection;
pub mod scene_camera;
pub mod transform;

// Re-export main types
pub use camera_controller::{CameraController, ControllerAction};
pub use motion::{CameraMotion, Flythrough, MovementIntent};
pub use projection::{Projection, OPENGL_TO_WGPU_MATRIX};
pub use scene_camera::Camera;
pub use transform::{Transform, TransformArena, TransformHandle};
