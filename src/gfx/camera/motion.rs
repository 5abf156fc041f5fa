//! Camera motion models
//!
//! A camera either flies freely with damped deltas or sits at a fixed orbit distance. The
//! variant is chosen at construction and dispatched on in [`CameraMotion::advance`].

use cgmath::{Vector3, Zero};

use super::transform::Transform;

/// What the input layer wants the camera to do this frame
///
/// `forward` and `sideways` are speeds in world units per second; `rotation` is an euler
/// delta in degrees that is applied as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementIntent {
    pub forward: f32,
    pub sideways: f32,
    pub rotation: Vector3<f32>,
}

impl Default for MovementIntent {
    fn default() -> Self {
        Self {
            forward: 0.0,
            sideways: 0.0,
            rotation: Vector3::zero(),
        }
    }
}

impl MovementIntent {
    pub fn is_idle(&self) -> bool {
        self.forward == 0.0 && self.sideways == 0.0 && self.rotation == Vector3::zero()
    }
}

/// Free-flying motion with exponentially decaying deltas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flythrough {
    /// Fraction of each delta removed per update, in `[0, 1]`
    pub damping: f32,
    pub min_pitch: f32,
    pub max_pitch: f32,
    pub rotation_delta: Vector3<f32>,
    pub forward_delta: Vector3<f32>,
    pub sideways_delta: Vector3<f32>,
}

impl Flythrough {
    pub fn new(damping: f32, min_pitch: f32, max_pitch: f32) -> Self {
        Self {
            damping,
            min_pitch,
            max_pitch,
            rotation_delta: Vector3::zero(),
            forward_delta: Vector3::zero(),
            sideways_delta: Vector3::zero(),
        }
    }

    /// Applies the pending deltas to `transform`, then decays them
    fn apply(&mut self, transform: &mut Transform) {
        let mut euler = transform.euler + self.rotation_delta;
        euler.x = euler.x.clamp(self.min_pitch, self.max_pitch);
        transform.rotate_with_euler(euler);

        transform.position += self.forward_delta;
        transform.position += self.sideways_delta;

        let keep = 1.0 - self.damping;
        self.rotation_delta *= keep;
        self.forward_delta *= keep;
        self.sideways_delta *= keep;
    }
}

impl Default for Flythrough {
    fn default() -> Self {
        Self::new(0.2, -89.0, 89.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraMotion {
    Flythrough(Flythrough),
    /// Holds its distance to the focus; never moves on its own
    Orbit { distance: f32 },
}

impl CameraMotion {
    /// Advances the motion state by one frame
    pub fn advance(&mut self, transform: &mut Transform) {
        match self {
            CameraMotion::Flythrough(flythrough) => flythrough.apply(transform),
            CameraMotion::Orbit { .. } => {}
        }
    }

    pub fn as_flythrough_mut(&mut self) -> Option<&mut Flythrough> {
        match self {
            CameraMotion::Flythrough(flythrough) => Some(flythrough),
            CameraMotion::Orbit { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::InnerSpace;

    #[test]
    fn test_rotation_delta_decays_geometrically() {
        let damping = 0.2;
        let r0 = Vector3::new(3.0, -5.0, 0.5);
        let mut flythrough = Flythrough::new(damping, -89.0, 89.0);
        flythrough.rotation_delta = r0;

        let mut transform = Transform::default();
        for k in 1..=20 {
            flythrough.apply(&mut transform);
            let expected = r0 * (1.0 - damping).powi(k);
            assert!((flythrough.rotation_delta - expected).magnitude() < 1e-4);
            assert_eq!(flythrough.rotation_delta.x.signum(), r0.x.signum());
            assert_eq!(flythrough.rotation_delta.y.signum(), r0.y.signum());
        }
    }

    #[test]
    fn test_deltas_apply_before_decay() {
        let mut flythrough = Flythrough::new(0.5, -89.0, 89.0);
        flythrough.forward_delta = Vector3::new(0.0, 0.0, -2.0);
        flythrough.sideways_delta = Vector3::new(1.0, 0.0, 0.0);

        let mut transform = Transform::default();
        flythrough.apply(&mut transform);
        assert_eq!(transform.position, Vector3::new(1.0, 0.0, -2.0));
        assert_eq!(flythrough.forward_delta, Vector3::new(0.0, 0.0, -1.0));

        flythrough.apply(&mut transform);
        assert_eq!(transform.position, Vector3::new(1.5, 0.0, -3.0));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut flythrough = Flythrough::new(0.0, -89.0, 89.0);
        flythrough.rotation_delta = Vector3::new(50.0, 0.0, 0.0);

        let mut transform = Transform::default();
        for _ in 0..5 {
            flythrough.apply(&mut transform);
        }
        assert_eq!(transform.euler.x, 89.0);
    }

    #[test]
    fn test_orbit_does_not_move() {
        let mut motion = CameraMotion::Orbit { distance: 12.0 };
        let mut transform = Transform::from_position(Vector3::new(1.0, 2.0, 3.0));
        motion.advance(&mut transform);

        assert_eq!(transform.position, Vector3::new(1.0, 2.0, 3.0));
        assert!(motion.as_flythrough_mut().is_none());
    }
}
