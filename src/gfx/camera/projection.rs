//! Projection variants
//!
//! Matrices are produced in the wgpu clip space convention (x, y in `[-1, 1]`, depth in
//! `[0, 1]`). They start from cgmath's OpenGL-style formulas and are remapped with
//! [`OPENGL_TO_WGPU_MATRIX`].

use cgmath::Matrix4;

use crate::config::Handedness;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Mirrors the view-space depth axis to turn a right-handed projection left-handed
#[rustfmt::skip]
const FLIP_Z: Matrix4<f32> = Matrix4::new(
    1.0, 0.0,  0.0, 0.0,
    0.0, 1.0,  0.0, 0.0,
    0.0, 0.0, -1.0, 0.0,
    0.0, 0.0,  0.0, 1.0,
);

/// OpenGL-style symmetric perspective with depth in `[-1, 1]`
///
/// Unlike `cgmath::perspective` this never asserts on its inputs; a zero near plane, a zero
/// aspect or `far == near` produce non-finite entries instead of a panic.
#[rustfmt::skip]
pub fn gl_perspective(fov_deg: f32, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    let f = 1.0 / (fov_deg.to_radians() / 2.0).tan();
    let depth = near - far;
    Matrix4::new(
        f / aspect, 0.0, 0.0,                       0.0,
        0.0,        f,   0.0,                       0.0,
        0.0,        0.0, (far + near) / depth,     -1.0,
        0.0,        0.0, 2.0 * far * near / depth,  0.0,
    )
}

/// The active projection and its parameters
///
/// Parameters are trusted: `near > 0`, `far > near` and `aspect > 0` are the caller's
/// responsibility. Violating them produces a degenerate matrix, never an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        aspect: f32,
        /// Vertical field of view in degrees
        fov: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            aspect,
            fov,
            near,
            far,
        }
    }

    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Projection::Orthographic {
            left,
            right,
            top,
            bottom,
            near,
            far,
        }
    }

    /// Builds the clip-space matrix for this projection
    pub fn matrix(&self, handedness: Handedness) -> Matrix4<f32> {
        let gl = match *self {
            Projection::Perspective {
                aspect,
                fov,
                near,
                far,
            } => gl_perspective(fov, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => cgmath::ortho(left, right, bottom, top, near, far),
        };

        let projection = OPENGL_TO_WGPU_MATRIX * gl;
        match handedness {
            Handedness::Right => projection,
            Handedness::Left => projection * FLIP_Z,
        }
    }

    /// Returns a copy with a new aspect ratio; orthographic projections are unchanged
    pub fn with_aspect(self, new_aspect: f32) -> Self {
        match self {
            Projection::Perspective { fov, near, far, .. } => Projection::Perspective {
                aspect: new_aspect,
                fov,
                near,
                far,
            },
            ortho @ Projection::Orthographic { .. } => ortho,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::transform::tests::assert_mat4_near;
    use cgmath::{Vector4, Zero};

    /// Symmetric-frustum perspective with depth mapped to `[0, 1]`, right-handed
    fn closed_form_perspective(fov_deg: f32, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
        let f = 1.0 / (fov_deg.to_radians() / 2.0).tan();
        let mut m = Matrix4::zero();
        m.x.x = f / aspect;
        m.y.y = f;
        m.z.z = far / (near - far);
        m.z.w = -1.0;
        m.w.z = near * far / (near - far);
        m
    }

    #[test]
    fn test_perspective_matches_closed_form() {
        let projection = Projection::perspective(60.0, 16.0 / 9.0, 0.1, 1000.0);
        let expected = closed_form_perspective(60.0, 16.0 / 9.0, 0.1, 1000.0);
        assert_mat4_near(projection.matrix(Handedness::Right), expected, 1e-4);
    }

    #[test]
    fn test_perspective_maps_near_and_far_to_unit_depth() {
        let m = Projection::perspective(60.0, 1.0, 0.5, 100.0).matrix(Handedness::Right);

        let near = m * Vector4::new(0.0, 0.0, -0.5, 1.0);
        let far = m * Vector4::new(0.0, 0.0, -100.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_left_handed_looks_down_positive_z() {
        let m = Projection::perspective(60.0, 1.0, 0.5, 100.0).matrix(Handedness::Left);

        let near = m * Vector4::new(0.0, 0.0, 0.5, 1.0);
        let far = m * Vector4::new(0.0, 0.0, 100.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
        assert!(near.w > 0.0);
    }

    #[test]
    fn test_orthographic_maps_box_to_clip_volume() {
        let m = Projection::orthographic(-2.0, 2.0, -1.0, 1.0, 1.0, 11.0).matrix(Handedness::Right);

        let corner = m * Vector4::new(2.0, 1.0, -11.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
        assert!((corner.z - 1.0).abs() < 1e-5);

        let near = m * Vector4::new(-2.0, -1.0, -1.0, 1.0);
        assert!((near.x + 1.0).abs() < 1e-5);
        assert!(near.z.abs() < 1e-5);
    }

    #[test]
    fn test_switching_variant_replaces_matrix() {
        let perspective = Projection::perspective(60.0, 1.0, 0.1, 100.0);
        let ortho = Projection::orthographic(-1.0, 1.0, -1.0, 1.0, 0.1, 100.0);
        assert_ne!(
            perspective.matrix(Handedness::Right),
            ortho.matrix(Handedness::Right)
        );
        assert_eq!(ortho.with_aspect(2.0), ortho);
    }

    #[test]
    fn test_with_aspect_updates_perspective() {
        let projection = Projection::perspective(60.0, 1280.0 / 720.0, 0.1, 1000.0)
            .with_aspect(1920.0 / 1080.0);
        match projection {
            Projection::Perspective { aspect, .. } => {
                assert!((aspect - 1920.0 / 1080.0).abs() < 1e-6)
            }
            Projection::Orthographic { .. } => panic!("variant changed"),
        }
    }

    #[test]
    fn test_degenerate_perspective_does_not_panic() {
        let zero_near = Projection::perspective(60.0, 1.0, 0.0, 100.0).matrix(Handedness::Right);
        assert_eq!(zero_near.w.z, 0.0);

        let zero_aspect = Projection::perspective(60.0, 0.0, 0.1, 100.0).matrix(Handedness::Left);
        assert!(!zero_aspect.x.x.is_finite());

        let collapsed = Projection::perspective(60.0, 1.0, 5.0, 5.0).matrix(Handedness::Right);
        assert!(!collapsed.z.z.is_finite());

        let zero_fov = Projection::perspective(0.0, 1.0, 0.1, 100.0).matrix(Handedness::Right);
        assert!(!zero_fov.y.y.is_finite());
    }
}
