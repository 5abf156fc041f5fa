//! Application configuration
//!
//! Every tunable the renderer reads at startup lives in [`AppConfig`]. Configurations are
//! plain TOML files; any field that is left out falls back to its default, so an empty file
//! is a valid configuration.

use std::path::Path;

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::gfx::{
    light::{MAX_CUTOFF, MIN_CUTOFF},
    rendering::passes::{CompositeTarget, LightingMode},
    resources::kernels::DitherPattern,
};

/// Coordinate system convention shared by every camera and the input controller
///
/// Read once at startup; nothing switches it per camera or per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

impl Handedness {
    /// Local-space forward axis: -Z for right-handed, +Z for left-handed
    pub fn forward_axis(self) -> Vector3<f32> {
        match self {
            Handedness::Right => Vector3::new(0.0, 0.0, -1.0),
            Handedness::Left => Vector3::new(0.0, 0.0, 1.0),
        }
    }

    /// Sign applied to horizontal mouse motion before it becomes a yaw delta
    pub fn yaw_sign(self) -> f32 {
        match self {
            Handedness::Right => -1.0,
            Handedness::Left => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Reflective Shadow Maps".to_string(),
            width: 1920,
            height: 1080,
            resizable: true,
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Fraction of the pending motion removed every frame, in `[0, 1]`
    pub damping: f32,
    pub max_pitch: f32,
    pub min_pitch: f32,
    /// Movement speed in world units per second
    pub speed: f32,
    /// Degrees of rotation per pixel of mouse motion
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 10.0, 30.0],
            fov: 60.0,
            near: 0.1,
            far: 1000.0,
            damping: 0.2,
            max_pitch: 89.0,
            min_pitch: -89.0,
            speed: 20.0,
            sensitivity: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub color: [f32; 3],
    /// Inner cone half-angle in degrees
    pub inner_cutoff: f32,
    /// Outer cone half-angle in degrees
    pub outer_cutoff: f32,
    pub intensity: f32,
    pub range: f32,
    pub bias: f32,
    pub flashlight: bool,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 7.0, 30.0],
            target: [-6.0, 7.0, 0.0],
            color: [1.0, 1.0, 1.0],
            inner_cutoff: 10.0,
            outer_cutoff: 15.0,
            intensity: 1.0,
            range: 5.0,
            bias: 0.001,
            flashlight: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsmConfig {
    /// Edge length of the square RSM targets in texels
    pub resolution: u32,
    /// Number of disk samples generated at startup
    pub kernel_size: u32,
    /// Number of kernel samples evaluated per pixel, at most `kernel_size`
    pub sample_count: u32,
    /// Sampling radius in RSM texels
    pub sample_radius: f32,
    pub indirect_amount: f32,
    pub dither: DitherPattern,
    pub kernel_seed: u64,
}

impl Default for RsmConfig {
    fn default() -> Self {
        Self {
            resolution: 1024,
            kernel_size: 256,
            sample_count: 256,
            sample_radius: 500.0,
            indirect_amount: 1.0,
            dither: DitherPattern::FourByFour,
            kernel_seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub mode: LightingMode,
    pub composite: CompositeTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub path: String,
    /// Uniform scale applied to the loaded scene
    pub scale: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            path: "assets/cornell_box.obj".to_string(),
            scale: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory saved render targets are written to
    pub directory: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            directory: "captures".to_string(),
        }
    }
}

/// Top-level configuration for a renderer session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub handedness: Handedness,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub rsm: RsmConfig,
    pub lighting: LightingConfig,
    pub scene: SceneConfig,
    pub capture: CaptureConfig,
}

impl AppConfig {
    /// Loads a configuration from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would allocate nothing, sample past the kernel or collapse a frustum
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rsm.resolution == 0 {
            return Err(ConfigError::Invalid("rsm.resolution must be non-zero".into()));
        }
        if self.rsm.kernel_size == 0 {
            return Err(ConfigError::Invalid("rsm.kernel_size must be non-zero".into()));
        }
        if self.rsm.sample_count > self.rsm.kernel_size {
            return Err(ConfigError::Invalid(format!(
                "rsm.sample_count ({}) exceeds rsm.kernel_size ({})",
                self.rsm.sample_count, self.rsm.kernel_size
            )));
        }
        if !(0.0..=1.0).contains(&self.camera.damping) {
            return Err(ConfigError::Invalid("camera.damping must be within [0, 1]".into()));
        }
        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(ConfigError::Invalid(format!(
                "camera.near ({}) must be positive and below camera.far ({})",
                camera.near, camera.far
            )));
        }
        if !(camera.fov > 0.0 && camera.fov < 180.0) {
            return Err(ConfigError::Invalid("camera.fov must be within (0, 180)".into()));
        }
        let light = &self.light;
        if !(MIN_CUTOFF..=MAX_CUTOFF).contains(&light.outer_cutoff) {
            return Err(ConfigError::Invalid(format!(
                "light.outer_cutoff must be within [{MIN_CUTOFF}, {MAX_CUTOFF}] degrees"
            )));
        }
        if !(0.0..=light.outer_cutoff).contains(&light.inner_cutoff) {
            return Err(ConfigError::Invalid(
                "light.inner_cutoff must be within [0, light.outer_cutoff]".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.rsm.resolution, 1024);
        assert_eq!(config.handedness, Handedness::Right);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            handedness = "left"

            [camera]
            fov = 75.0

            [lighting]
            mode = "indirect_only"
            "#,
        )
        .unwrap();

        assert_eq!(config.handedness, Handedness::Left);
        assert_eq!(config.camera.fov, 75.0);
        assert_eq!(config.camera.near, 0.1);
        assert_eq!(config.lighting.mode, LightingMode::IndirectOnly);
        assert_eq!(config.light, LightConfig::default());
        assert_eq!(config.capture.directory, "captures");
    }

    #[test]
    fn test_sample_count_cannot_exceed_kernel() {
        let result = AppConfig::from_toml_str(
            r#"
            [rsm]
            kernel_size = 64
            sample_count = 128
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_degenerate_camera_planes_are_rejected() {
        for text in ["[camera]\nnear = 0.0", "[camera]\nnear = 10.0\nfar = 5.0"] {
            let result = AppConfig::from_toml_str(text);
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "{text}");
        }
    }

    #[test]
    fn test_light_cutoffs_are_bounded() {
        for text in [
            "[light]\ninner_cutoff = 0.0\nouter_cutoff = 0.0",
            "[light]\nouter_cutoff = 90.0",
            "[light]\ninner_cutoff = 20.0\nouter_cutoff = 15.0",
        ] {
            let result = AppConfig::from_toml_str(text);
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "{text}");
        }
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let result = AppConfig::from_toml_str("[camera\nfov = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_handedness_flips_forward_and_yaw() {
        assert_eq!(Handedness::Right.forward_axis(), -Handedness::Left.forward_axis());
        assert_eq!(Handedness::Right.yaw_sign(), -Handedness::Left.yaw_sign());
    }

    #[test]
    fn test_cornell_box_demo_config_is_valid() {
        let config =
            AppConfig::from_toml_str(include_str!("../demos/cornell_box/config.toml")).unwrap();
        assert_eq!(config.rsm.sample_count, 128);
        assert_eq!(config.lighting.composite, CompositeTarget::Surface);
        assert_eq!(config.scene.path, "assets/cornell_box.obj");
        assert!(config.window.resizable);
        assert_eq!(config.capture.directory, "captures/cornell_box");
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = AppConfig::default();
        config.rsm.dither = DitherPattern::EightByEight;
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }
}
