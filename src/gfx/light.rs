//! Spot light
//!
//! The light that casts the reflective shadow map. Its view-projection is derived from
//! position, target and outer cutoff and must be refreshed with [`SpotLight::update`] after
//! any of them change.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix, Vector3};

use crate::config::LightConfig;
use crate::gfx::camera::{projection::gl_perspective, Camera, OPENGL_TO_WGPU_MATRIX};

pub const LIGHT_NEAR: f32 = 1.0;
pub const LIGHT_FAR: f32 = 1000.0;

/// Cone half-angles the light projection accepts, in degrees
pub const MIN_CUTOFF: f32 = 0.5;
pub const MAX_CUTOFF: f32 = 89.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SpotLight {
    pub position: Vector3<f32>,
    pub target: Vector3<f32>,
    pub color: Vector3<f32>,
    /// Inner cone half-angle in degrees
    pub inner_cutoff: f32,
    /// Outer cone half-angle in degrees
    pub outer_cutoff: f32,
    pub intensity: f32,
    pub range: f32,
    pub bias: f32,
    /// When set, the light follows the camera position and forward direction
    pub flashlight: bool,
    direction: Vector3<f32>,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
}

impl SpotLight {
    pub fn new(config: &LightConfig) -> Self {
        let mut light = Self {
            position: Vector3::from(config.position),
            target: Vector3::from(config.target),
            color: Vector3::from(config.color),
            inner_cutoff: config.inner_cutoff,
            outer_cutoff: config.outer_cutoff,
            intensity: config.intensity,
            range: config.range,
            bias: config.bias,
            flashlight: config.flashlight,
            direction: Vector3::new(0.0, 0.0, -1.0),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
        };
        light.update();
        light
    }

    /// Recomputes direction, view and projection from the current parameters
    pub fn update(&mut self) {
        let to_target = self.target - self.position;
        if to_target.magnitude2() > f32::EPSILON {
            self.direction = to_target.normalize();
        }

        let eye = Point3::from_vec(self.position);
        self.view = Matrix4::look_at_rh(eye, eye + self.direction, light_up(self.direction));
        let half_angle = self.outer_cutoff.clamp(MIN_CUTOFF, MAX_CUTOFF);
        self.projection =
            OPENGL_TO_WGPU_MATRIX * gl_perspective(2.0 * half_angle, 1.0, LIGHT_NEAR, LIGHT_FAR);
    }

    /// Slaves the light to the camera when flashlight mode is on, then updates
    pub fn follow_camera(&mut self, camera: &Camera) {
        if self.flashlight {
            self.position = camera.position();
            self.target = camera.position() + camera.forward();
        }
        self.update();
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.direction
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection * self.view
    }

    pub fn cos_inner(&self) -> f32 {
        self.inner_cutoff.to_radians().cos()
    }

    pub fn cos_outer(&self) -> f32 {
        self.outer_cutoff.to_radians().cos()
    }

    /// Angular falloff for a point: 0 outside the outer cone, 1 inside the inner cone
    pub fn spot_weight(&self, point: Vector3<f32>) -> f32 {
        let to_point = point - self.position;
        if to_point.magnitude2() <= f32::EPSILON {
            return 1.0;
        }
        let theta = to_point.normalize().dot(self.direction);
        let epsilon = self.cos_inner() - self.cos_outer();
        if epsilon <= 0.0 {
            return if theta >= self.cos_outer() { 1.0 } else { 0.0 };
        }
        ((theta - self.cos_outer()) / epsilon).clamp(0.0, 1.0)
    }

    /// Distance attenuation `range / (range + d)`
    pub fn range_attenuation(&self, point: Vector3<f32>) -> f32 {
        let distance = (point - self.position).magnitude();
        self.range / (self.range + distance)
    }
}

/// Picks an up vector that is not parallel to the light direction
fn light_up(direction: Vector3<f32>) -> Vector3<f32> {
    if direction.y.abs() > 0.999 {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Quaternion, Rotation3, Vector4};

    fn light() -> SpotLight {
        SpotLight::new(&LightConfig {
            position: [0.0, 0.0, 0.0],
            target: [0.0, 0.0, -10.0],
            ..Default::default()
        })
    }

    fn point_at_angle(degrees: f32) -> Vector3<f32> {
        Quaternion::from_angle_y(Deg(degrees)) * Vector3::new(0.0, 0.0, -5.0)
    }

    #[test]
    fn test_outer_cutoff_has_zero_weight() {
        let light = light();
        assert!(light.spot_weight(point_at_angle(15.0)).abs() < 1e-3);
        assert_eq!(light.spot_weight(point_at_angle(30.0)), 0.0);
    }

    #[test]
    fn test_inner_cutoff_has_full_weight() {
        let light = light();
        assert!((light.spot_weight(point_at_angle(10.0)) - 1.0).abs() < 1e-3);
        assert_eq!(light.spot_weight(point_at_angle(0.0)), 1.0);
    }

    #[test]
    fn test_weight_is_between_cutoffs() {
        let weight = light().spot_weight(point_at_angle(12.5));
        assert!(weight > 0.0 && weight < 1.0);
    }

    #[test]
    fn test_range_attenuation() {
        let light = light();
        assert_eq!(light.range_attenuation(Vector3::new(0.0, 0.0, 0.0)), 1.0);
        assert!((light.range_attenuation(Vector3::new(0.0, 0.0, -5.0)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_target_projects_to_center_of_light_view() {
        let light = SpotLight::new(&LightConfig::default());
        let target = light.target;
        let clip = light.view_projection() * Vector4::new(target.x, target.y, target.z, 1.0);

        assert!((clip.x / clip.w).abs() < 1e-4);
        assert!((clip.y / clip.w).abs() < 1e-4);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn test_default_light_direction() {
        let light = SpotLight::new(&LightConfig::default());
        let expected = Vector3::new(-6.0, 0.0, -30.0).normalize();
        assert!((light.direction() - expected).magnitude() < 1e-6);
    }

    #[test]
    fn test_out_of_range_cutoff_keeps_projection_finite() {
        let mut light = SpotLight::new(&LightConfig {
            inner_cutoff: 0.0,
            outer_cutoff: 0.0,
            ..Default::default()
        });
        let narrow = light.view_projection();
        assert!(narrow.x.x.is_finite() && narrow.y.y.is_finite());

        light.outer_cutoff = 120.0;
        light.update();
        let wide = light.view_projection();
        assert!(wide.x.x.is_finite() && wide.y.y.is_finite());

        // Wider cones are held at the largest supported half-angle
        let expected = SpotLight::new(&LightConfig {
            outer_cutoff: MAX_CUTOFF,
            ..Default::default()
        });
        assert_eq!(wide, expected.view_projection());
    }
}
