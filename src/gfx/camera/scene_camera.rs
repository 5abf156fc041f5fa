//! The scene camera
//!
//! A [`Camera`] owns its [`Transform`] and [`Projection`] and may be attached to a parent
//! transform living in a [`TransformArena`]. The view matrix is always derived from the
//! composed world transform; it is never edited directly.

use cgmath::{Matrix4, SquareMatrix, Vector3};

use super::{
    motion::{CameraMotion, Flythrough, MovementIntent},
    projection::Projection,
    transform::{Transform, TransformArena, TransformHandle},
};
use crate::config::{CameraConfig, Handedness};

#[derive(Debug, Clone)]
pub struct Camera {
    pub transform: Transform,
    pub motion: CameraMotion,
    projection: Projection,
    projection_matrix: Matrix4<f32>,
    view: Matrix4<f32>,
    parent: Option<TransformHandle>,
    handedness: Handedness,
}

impl Camera {
    pub fn new(
        position: Vector3<f32>,
        projection: Projection,
        motion: CameraMotion,
        handedness: Handedness,
    ) -> Self {
        let mut transform = Transform::from_position(position);
        transform.update();

        let mut camera = Self {
            transform,
            motion,
            projection,
            projection_matrix: projection.matrix(handedness),
            view: Matrix4::identity(),
            parent: None,
            handedness,
        };
        camera.recompute_view(None);
        camera
    }

    /// Builds a flythrough camera from the startup configuration
    pub fn flythrough(config: &CameraConfig, aspect: f32, handedness: Handedness) -> Self {
        Self::new(
            Vector3::from(config.position),
            Projection::perspective(config.fov, aspect, config.near, config.far),
            CameraMotion::Flythrough(Flythrough::new(
                config.damping,
                config.min_pitch,
                config.max_pitch,
            )),
            handedness,
        )
    }

    /// Replaces the projection variant and rebuilds its matrix
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.projection_matrix = projection.matrix(self.handedness);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.set_projection(self.projection.with_aspect(aspect));
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn set_parent(&mut self, parent: Option<TransformHandle>) {
        self.parent = parent;
    }

    pub fn parent(&self) -> Option<TransformHandle> {
        self.parent
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Advances the motion, recomputes the model matrix and derives the view from it
    ///
    /// Pending deltas are per-frame quantities; time scaling happens in
    /// [`Camera::integrate`].
    pub fn update(&mut self, arena: &TransformArena) {
        self.motion.advance(&mut self.transform);
        self.transform.update();

        let parent_model = match self.parent {
            Some(handle) => match arena.get(handle) {
                Some(parent) => Some(parent.model()),
                None => {
                    log::warn!("Camera parent {:?} is not in the arena, ignoring it", handle);
                    None
                }
            },
            None => None,
        };
        self.recompute_view(parent_model);
    }

    fn recompute_view(&mut self, parent_model: Option<Matrix4<f32>>) {
        let world = self.world_model(parent_model);
        self.view = match world.invert() {
            Some(view) => view,
            None => {
                log::warn!("Camera world transform is not invertible, using identity view");
                Matrix4::identity()
            }
        };
    }

    fn world_model(&self, parent_model: Option<Matrix4<f32>>) -> Matrix4<f32> {
        match parent_model {
            Some(parent) => self.transform.model() * parent,
            None => self.transform.model(),
        }
    }

    /// Sets the pending rotation delta in degrees
    pub fn rotate(&mut self, euler_delta: Vector3<f32>) {
        if let Some(flythrough) = self.motion.as_flythrough_mut() {
            flythrough.rotation_delta = euler_delta;
        }
    }

    /// Sets the pending forward translation along the current orientation
    pub fn move_forward(&mut self, amount: f32) {
        let forward = self.forward();
        if let Some(flythrough) = self.motion.as_flythrough_mut() {
            flythrough.forward_delta = forward * amount;
        }
    }

    /// Sets the pending sideways translation; positive amounts move left
    pub fn move_sideways(&mut self, amount: f32) {
        let left = self.left();
        if let Some(flythrough) = self.motion.as_flythrough_mut() {
            flythrough.sideways_delta = left * amount;
        }
    }

    /// Turns an input intent into pending deltas
    ///
    /// Non-zero components replace the matching delta; zero components leave it decaying.
    /// Orbit cameras ignore intents.
    pub fn integrate(&mut self, dt: f32, intent: &MovementIntent) {
        if !matches!(self.motion, CameraMotion::Flythrough(_)) {
            return;
        }

        if intent.rotation != Vector3::new(0.0, 0.0, 0.0) {
            self.rotate(intent.rotation);
        }
        if intent.forward != 0.0 {
            self.move_forward(intent.forward * dt);
        }
        if intent.sideways != 0.0 {
            self.move_sideways(intent.sideways * dt);
        }
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.transform.rotate_vector(self.handedness.forward_axis())
    }

    pub fn left(&self) -> Vector3<f32> {
        self.transform.rotate_vector(Vector3::new(-1.0, 0.0, 0.0))
    }

    pub fn position(&self) -> Vector3<f32> {
        self.transform.position
    }

    pub fn view(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection_matrix
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix * self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::transform::tests::assert_mat4_near;
    use cgmath::InnerSpace;

    fn flythrough_at(position: Vector3<f32>, damping: f32) -> Camera {
        Camera::new(
            position,
            Projection::perspective(60.0, 16.0 / 9.0, 0.1, 1000.0),
            CameraMotion::Flythrough(Flythrough::new(damping, -89.0, 89.0)),
            Handedness::Right,
        )
    }

    #[test]
    fn test_view_is_inverse_of_model() {
        let arena = TransformArena::new();
        let mut camera = flythrough_at(Vector3::new(3.0, 4.0, -5.0), 0.2);
        camera.transform.rotate_with_euler(Vector3::new(-15.0, 40.0, 0.0));
        camera.update(&arena);

        assert_mat4_near(camera.view() * camera.transform.model(), Matrix4::identity(), 1e-5);
    }

    #[test]
    fn test_view_includes_parent() {
        let mut arena = TransformArena::new();
        let mut parent = Transform::from_position(Vector3::new(0.0, 2.0, 0.0));
        parent.rotate_with_euler(Vector3::new(0.0, 90.0, 0.0));
        let handle = arena.insert(parent);

        let mut camera = flythrough_at(Vector3::new(1.0, 0.0, 0.0), 0.2);
        camera.set_parent(Some(handle));
        camera.update(&arena);

        let world = camera.transform.model() * arena.get(handle).unwrap().model();
        assert_mat4_near(camera.view(), world.invert().unwrap(), 1e-5);
    }

    #[test]
    fn test_missing_parent_is_ignored() {
        let mut other = TransformArena::new();
        let handle = other.insert(Transform::from_position(Vector3::new(9.0, 9.0, 9.0)));

        let arena = TransformArena::new();
        let mut camera = flythrough_at(Vector3::new(1.0, 0.0, 0.0), 0.2);
        camera.set_parent(Some(handle));
        camera.update(&arena);

        assert_mat4_near(camera.view() * camera.transform.model(), Matrix4::identity(), 1e-5);
    }

    #[test]
    fn test_move_uses_current_orientation() {
        let arena = TransformArena::new();
        let mut camera = flythrough_at(Vector3::new(0.0, 0.0, 0.0), 1.0);
        camera.transform.rotate_with_euler(Vector3::new(0.0, 90.0, 0.0));

        // Yawing 90 degrees about +Y turns -Z into -X
        camera.move_forward(2.0);
        camera.update(&arena);
        assert!((camera.position() - Vector3::new(-2.0, 0.0, 0.0)).magnitude() < 1e-5);

        camera.move_sideways(1.0);
        camera.update(&arena);
        assert!((camera.position() - Vector3::new(-2.0, 0.0, 1.0)).magnitude() < 1e-5);
    }

    #[test]
    fn test_left_handed_forward_is_positive_z() {
        let camera = Camera::new(
            Vector3::new(0.0, 0.0, 0.0),
            Projection::perspective(60.0, 1.0, 0.1, 100.0),
            CameraMotion::Orbit { distance: 5.0 },
            Handedness::Left,
        );
        assert_eq!(camera.forward(), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_integrate_keeps_decaying_delta_for_idle_axes() {
        let arena = TransformArena::new();
        let mut camera = flythrough_at(Vector3::new(0.0, 0.0, 0.0), 0.5);

        let intent = MovementIntent {
            forward: 10.0,
            ..Default::default()
        };
        camera.integrate(0.1, &intent);
        camera.update(&arena);
        assert!((camera.position().z + 1.0).abs() < 1e-5);

        camera.integrate(0.1, &MovementIntent::default());
        camera.update(&arena);
        assert!((camera.position().z + 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_orbit_ignores_intents() {
        let arena = TransformArena::new();
        let mut camera = Camera::new(
            Vector3::new(0.0, 0.0, 10.0),
            Projection::perspective(60.0, 1.0, 0.1, 100.0),
            CameraMotion::Orbit { distance: 10.0 },
            Handedness::Right,
        );
        let intent = MovementIntent {
            forward: 5.0,
            sideways: 5.0,
            rotation: Vector3::new(10.0, 10.0, 0.0),
        };
        camera.integrate(1.0, &intent);
        camera.update(&arena);

        assert_eq!(camera.position(), Vector3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn test_set_aspect_rebuilds_projection() {
        let mut camera = flythrough_at(Vector3::new(0.0, 0.0, 0.0), 0.2);
        camera.set_aspect(1920.0 / 1080.0);

        let expected = Projection::perspective(60.0, 1920.0 / 1080.0, 0.1, 1000.0);
        assert_eq!(*camera.projection(), expected);
        assert_mat4_near(
            camera.projection_matrix(),
            expected.matrix(Handedness::Right),
            1e-6,
        );
    }

    /// Twice the signed screen-space area of a world-space triangle; positive is counter-clockwise
    fn ndc_signed_area(camera: &Camera, triangle: [Vector3<f32>; 3]) -> f32 {
        let ndc = triangle.map(|p| {
            let clip = camera.view_projection() * p.extend(1.0);
            (clip.x / clip.w, clip.y / clip.w)
        });
        let (ax, ay) = (ndc[1].0 - ndc[0].0, ndc[1].1 - ndc[0].1);
        let (bx, by) = (ndc[2].0 - ndc[0].0, ndc[2].1 - ndc[0].1);
        ax * by - ay * bx
    }

    #[test]
    fn test_left_handed_projection_mirrors_winding() {
        let arena = TransformArena::new();
        let mut camera = flythrough_at(Vector3::new(0.0, 0.0, 0.0), 0.2);
        camera.update(&arena);
        // Counter-clockwise around +Z, facing a camera that looks down -Z
        let facing = [
            Vector3::new(-1.0, -1.0, -5.0),
            Vector3::new(1.0, -1.0, -5.0),
            Vector3::new(0.0, 1.0, -5.0),
        ];
        assert!(ndc_signed_area(&camera, facing) > 0.0);

        let mut camera = Camera::new(
            Vector3::new(0.0, 0.0, 0.0),
            Projection::perspective(60.0, 16.0 / 9.0, 0.1, 1000.0),
            CameraMotion::Flythrough(Flythrough::new(0.2, -89.0, 89.0)),
            Handedness::Left,
        );
        camera.update(&arena);
        // Counter-clockwise around -Z, facing a camera that looks down +Z
        let facing = [
            Vector3::new(-1.0, -1.0, 5.0),
            Vector3::new(0.0, 1.0, 5.0),
            Vector3::new(1.0, -1.0, 5.0),
        ];
        assert!(ndc_signed_area(&camera, facing) < 0.0);
    }
}
