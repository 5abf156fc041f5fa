//! Hierarchical transforms
//!
//! A [`Transform`] bundles position, euler angles, orientation and scale and derives a model
//! matrix from them. Parent links between transforms are expressed as [`TransformHandle`]s
//! into a [`TransformArena`] rather than references, so a child never outlives its parent.

use cgmath::{Deg, Matrix4, Quaternion, Rotation3, SquareMatrix, Vector3, Zero};

/// Position, orientation and scale of an object with a cached model matrix
///
/// The model matrix is only valid after [`Transform::update`] has run; callers mutate the
/// inputs freely and recompute once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    /// Euler angles in degrees: x = pitch, y = yaw, z = roll.
    pub euler: Vector3<f32>,
    pub orientation: Quaternion<f32>,
    pub scale: Vector3<f32>,
    model: Matrix4<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::zero(),
            euler: Vector3::zero(),
            orientation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            model: Matrix4::identity(),
        }
    }
}

impl Transform {
    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Builds a uniformly scaled transform at the origin
    pub fn from_scale(scale: f32) -> Self {
        let mut transform = Self {
            scale: Vector3::new(scale, scale, scale),
            ..Default::default()
        };
        transform.update();
        transform
    }

    /// Sets the euler angles and rebuilds the orientation from them
    pub fn rotate_with_euler(&mut self, euler: Vector3<f32>) {
        self.euler = euler;
        self.orientation = orientation_from_euler(euler);
    }

    /// Recomputes `model = T * R * S`
    pub fn update(&mut self) {
        let t = Matrix4::from_translation(self.position);
        let r = Matrix4::from(self.orientation);
        let s = Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z);

        self.model = t * r * s;
    }

    /// The model matrix computed by the last [`Transform::update`]
    pub fn model(&self) -> Matrix4<f32> {
        self.model
    }

    /// Rotates a local-space direction into world space
    pub fn rotate_vector(&self, local: Vector3<f32>) -> Vector3<f32> {
        self.orientation * local
    }
}

/// Composes an orientation as `yaw * pitch * roll` from euler angles in degrees
///
/// The order is fixed; quaternion multiplication does not commute.
pub fn orientation_from_euler(euler: Vector3<f32>) -> Quaternion<f32> {
    let pitch = Quaternion::from_angle_x(Deg(euler.x));
    let yaw = Quaternion::from_angle_y(Deg(euler.y));
    let roll = Quaternion::from_angle_z(Deg(euler.z));

    yaw * pitch * roll
}

/// Index of a transform stored in a [`TransformArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformHandle(usize);

/// Append-only storage for transforms that other objects attach to
///
/// Handles stay valid for the lifetime of the arena since entries are never removed.
#[derive(Debug, Default)]
pub struct TransformArena {
    transforms: Vec<Transform>,
}

impl TransformArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut transform: Transform) -> TransformHandle {
        transform.update();
        self.transforms.push(transform);
        TransformHandle(self.transforms.len() - 1)
    }

    pub fn get(&self, handle: TransformHandle) -> Option<&Transform> {
        self.transforms.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: TransformHandle) -> Option<&mut Transform> {
        self.transforms.get_mut(handle.0)
    }

    /// Recomputes every stored model matrix
    pub fn update_all(&mut self) {
        for transform in &mut self.transforms {
            transform.update();
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cgmath::InnerSpace;

    pub(crate) fn assert_mat4_near(a: Matrix4<f32>, b: Matrix4<f32>, eps: f32) {
        for c in 0..4 {
            for r in 0..4 {
                assert!(
                    (a[c][r] - b[c][r]).abs() <= eps,
                    "mismatch at column {c} row {r}: {} vs {}\n{a:?}\n{b:?}",
                    a[c][r],
                    b[c][r]
                );
            }
        }
    }

    #[test]
    fn test_default_transform_is_identity() {
        let mut transform = Transform::default();
        transform.update();
        assert_mat4_near(transform.model(), Matrix4::identity(), 1e-6);
    }

    #[test]
    fn test_model_is_translate_rotate_scale() {
        let mut transform = Transform::from_position(Vector3::new(1.0, -2.0, 3.5));
        transform.rotate_with_euler(Vector3::new(20.0, 45.0, -10.0));
        transform.scale = Vector3::new(2.0, 0.5, 3.0);
        transform.update();

        let expected = Matrix4::from_translation(transform.position)
            * Matrix4::from(transform.orientation)
            * Matrix4::from_nonuniform_scale(2.0, 0.5, 3.0);
        assert_mat4_near(transform.model(), expected, 1e-5);
    }

    #[test]
    fn test_model_is_stale_until_update() {
        let mut transform = Transform::default();
        transform.update();
        transform.position = Vector3::new(5.0, 0.0, 0.0);
        assert_mat4_near(transform.model(), Matrix4::identity(), 1e-6);

        transform.update();
        assert_eq!(transform.model().w.truncate(), Vector3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_euler_composition_order_is_yaw_pitch_roll() {
        let euler = Vector3::new(30.0, 60.0, 15.0);
        let q = orientation_from_euler(euler);

        let yaw_pitch_roll = Quaternion::from_angle_y(Deg(60.0))
            * Quaternion::from_angle_x(Deg(30.0))
            * Quaternion::from_angle_z(Deg(15.0));
        let roll_pitch_yaw = Quaternion::from_angle_z(Deg(15.0))
            * Quaternion::from_angle_x(Deg(30.0))
            * Quaternion::from_angle_y(Deg(60.0));

        let sample = Vector3::new(0.3, -0.7, 1.0);
        assert!(((q * sample) - (yaw_pitch_roll * sample)).magnitude() < 1e-5);
        assert!(((q * sample) - (roll_pitch_yaw * sample)).magnitude() > 1e-2);
    }

    #[test]
    fn test_orientation_stays_unit_length() {
        let q = orientation_from_euler(Vector3::new(-80.0, 270.0, 33.0));
        assert!((q.magnitude() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_arena_handles_resolve_updated_models() {
        let mut arena = TransformArena::new();
        let handle = arena.insert(Transform::from_position(Vector3::new(0.0, 4.0, 0.0)));
        assert_eq!(arena.len(), 1);

        let model = arena.get(handle).unwrap().model();
        assert_eq!(model.w.truncate(), Vector3::new(0.0, 4.0, 0.0));

        arena.get_mut(handle).unwrap().scale = Vector3::new(2.0, 2.0, 2.0);
        arena.update_all();
        let model = arena.get(handle).unwrap().model();
        assert!((model.x.x - 2.0).abs() < 1e-6);
        assert_eq!(model.w.truncate(), Vector3::new(0.0, 4.0, 0.0));
    }
}
