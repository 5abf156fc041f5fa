use cgmath::Vector3;
use winit::{
    event::{DeviceEvent, ElementState, KeyEvent, MouseButton},
    keyboard::{KeyCode, PhysicalKey},
};

use super::motion::MovementIntent;
use crate::config::{CameraConfig, Handedness};

/// Actions the controller hands back to the application instead of applying itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerAction {
    TogglePanel,
    Quit,
}

/// Turns keyboard and mouse events into per-frame [`MovementIntent`]s
pub struct CameraController {
    pub speed: f32,
    pub sensitivity: f32,
    handedness: Handedness,
    is_forward_pressed: bool,
    is_backward_pressed: bool,
    is_left_pressed: bool,
    is_right_pressed: bool,
    is_mouse_look: bool,
    is_space_held: bool,
    mouse_delta: (f32, f32),
}

impl CameraController {
    pub fn new(config: &CameraConfig, handedness: Handedness) -> Self {
        Self {
            speed: config.speed,
            sensitivity: config.sensitivity,
            handedness,
            is_forward_pressed: false,
            is_backward_pressed: false,
            is_left_pressed: false,
            is_right_pressed: false,
            is_mouse_look: false,
            is_space_held: false,
            mouse_delta: (0.0, 0.0),
        }
    }

    pub fn process_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Right {
            self.is_mouse_look = state == ElementState::Pressed;
        }
    }

    pub fn process_events(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.is_looking() {
                self.mouse_delta.0 += delta.0 as f32;
                self.mouse_delta.1 += delta.1 as f32;
            }
        }
    }

    pub fn process_keyed_events(&mut self, event: &KeyEvent) -> Option<ControllerAction> {
        let PhysicalKey::Code(code) = event.physical_key else {
            return None;
        };
        let pressed = event.state == ElementState::Pressed;

        match code {
            KeyCode::KeyW => self.is_forward_pressed = pressed,
            KeyCode::KeyS => self.is_backward_pressed = pressed,
            KeyCode::KeyA => self.is_left_pressed = pressed,
            KeyCode::KeyD => self.is_right_pressed = pressed,
            KeyCode::Space => self.is_space_held = pressed,
            KeyCode::KeyG if pressed && !event.repeat => return Some(ControllerAction::TogglePanel),
            KeyCode::Escape if pressed => return Some(ControllerAction::Quit),
            _ => (),
        }
        None
    }

    pub fn is_looking(&self) -> bool {
        self.is_mouse_look || self.is_space_held
    }

    /// Drains the accumulated input into an intent for this frame
    pub fn take_intent(&mut self) -> MovementIntent {
        let (dx, dy) = std::mem::take(&mut self.mouse_delta);

        MovementIntent {
            forward: self.axis(self.is_forward_pressed, self.is_backward_pressed) * self.speed,
            sideways: self.axis(self.is_left_pressed, self.is_right_pressed) * self.speed,
            rotation: Vector3::new(
                -dy * self.sensitivity,
                self.handedness.yaw_sign() * dx * self.sensitivity,
                0.0,
            ),
        }
    }

    fn axis(&self, positive: bool, negative: bool) -> f32 {
        match (positive, negative) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(handedness: Handedness) -> CameraController {
        CameraController::new(&CameraConfig::default(), handedness)
    }

    #[test]
    fn test_idle_controller_yields_idle_intent() {
        let mut controller = controller(Handedness::Right);
        assert!(controller.take_intent().is_idle());
    }

    #[test]
    fn test_mouse_motion_requires_mouse_look() {
        let mut controller = controller(Handedness::Right);
        controller.process_events(&DeviceEvent::MouseMotion { delta: (10.0, 0.0) });
        assert!(controller.take_intent().is_idle());

        controller.process_mouse_button(MouseButton::Right, ElementState::Pressed);
        controller.process_events(&DeviceEvent::MouseMotion { delta: (10.0, 4.0) });
        let intent = controller.take_intent();
        assert!((intent.rotation.y + 10.0 * 0.05).abs() < 1e-6);
        assert!((intent.rotation.x + 4.0 * 0.05).abs() < 1e-6);

        // Motion is consumed by the first take
        assert!(controller.take_intent().is_idle());
    }

    #[test]
    fn test_handedness_flips_yaw() {
        let mut right = controller(Handedness::Right);
        let mut left = controller(Handedness::Left);
        for c in [&mut right, &mut left] {
            c.process_mouse_button(MouseButton::Right, ElementState::Pressed);
            c.process_events(&DeviceEvent::MouseMotion { delta: (6.0, 0.0) });
        }
        assert_eq!(right.take_intent().rotation.y, -left.take_intent().rotation.y);
    }
}
