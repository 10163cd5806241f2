use glam::{Mat4, Vec2, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone)]
pub struct Camera {
    // --- Primary State ---
    /// Camera position in world units.
    pub position: Vec3,
    /// Heading around the world Y axis (radians). 0 looks down +X.
    pub yaw_rad: f32,
    /// Tilt from the horizon (radians), clamped to ±89°.
    pub pitch_rad: f32,

    // --- Projection Parameters ---
    /// Vertical field of view in radians.
    pub fov_y_rad: f32,
    /// Viewport resolution in physical pixels.
    pub resolution: Vec2,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Creates a first-person camera looking down -Z.
    pub fn new(position: Vec3, fov_y_rad: f32, resolution: Vec2, near: f32, far: f32) -> Self {
        Self {
            position,
            yaw_rad: -std::f32::consts::FRAC_PI_2,
            pitch_rad: 0.0,
            fov_y_rad,
            resolution,
            near,
            far,
        }
    }

    /// Unit vector the camera is looking along.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw_rad.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch_rad.sin_cos();
        Vec3::new(cos_yaw * cos_pitch, sin_pitch, sin_yaw * cos_pitch)
    }

    /// Unit vector to the camera's right, in the ground plane.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// wgpu clip space: right-handed, depth in [0,1].
    pub fn proj(&self) -> Mat4 {
        let aspect = self.resolution.x / self.resolution.y.max(1.0);
        Mat4::perspective_rh(self.fov_y_rad, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix, uploaded once per frame.
    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.resolution = Vec2::new(width as f32, height as f32);
    }
}

/// Translates window events into camera deltas. All mutation happens on
/// the render thread; there is no concurrent writer.
pub struct CameraController {
    move_speed: f32,
    look_sensitivity: f32,
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

impl CameraController {
    pub fn new() -> Self {
        Self {
            move_speed: 2.0,
            look_sensitivity: 0.005,
            mouse_down: false,
            last_mouse: None,
            forward: false,
            backward: false,
            left: false,
            right: false,
            up: false,
            down: false,
        }
    }

    /// Handles window events and updates look state. Returns true when the
    /// event was consumed as camera input.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut Camera) -> bool {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                    if !self.mouse_down {
                        self.last_mouse = None;
                    }
                    return true;
                }
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_look((position.x, position.y), camera);
                self.mouse_down
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                // Scroll adjusts travel speed rather than zoom.
                self.move_speed = (self.move_speed * 1.1f32.powf(scroll)).clamp(0.1, 50.0);
                true
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state == ElementState::Pressed;
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::KeyW) => self.forward = pressed,
                    PhysicalKey::Code(KeyCode::KeyS) => self.backward = pressed,
                    PhysicalKey::Code(KeyCode::KeyA) => self.left = pressed,
                    PhysicalKey::Code(KeyCode::KeyD) => self.right = pressed,
                    PhysicalKey::Code(KeyCode::Space) => self.up = pressed,
                    PhysicalKey::Code(KeyCode::ShiftLeft) => self.down = pressed,
                    _ => return false,
                }
                true
            }
            _ => false,
        }
    }

    /// Applies accumulated movement. Called once per frame with the frame
    /// delta in seconds.
    pub fn update(&mut self, dt: f32, camera: &mut Camera) {
        let mut dir = Vec3::ZERO;
        let forward = camera.forward();
        let right = camera.right();

        if self.forward {
            dir += forward;
        }
        if self.backward {
            dir -= forward;
        }
        if self.right {
            dir += right;
        }
        if self.left {
            dir -= right;
        }
        if self.up {
            dir += Vec3::Y;
        }
        if self.down {
            dir -= Vec3::Y;
        }

        if dir != Vec3::ZERO {
            camera.position += dir.normalize() * self.move_speed * dt;
        }
    }

    /// Rotates the view while the left mouse button is held.
    fn handle_cursor_look(&mut self, xy: (f64, f64), camera: &mut Camera) {
        if let Some(last) = self.last_mouse {
            if self.mouse_down {
                let dx = (xy.0 - last.0) as f32 * self.look_sensitivity;
                let dy = (last.1 - xy.1) as f32 * self.look_sensitivity;

                camera.yaw_rad += dx;
                camera.pitch_rad += dy;

                // Clamp pitch to prevent flipping over the poles.
                let limit = 89f32.to_radians();
                camera.pitch_rad = camera.pitch_rad.clamp(-limit, limit);
            }
        }
        self.last_mouse = Some(xy);
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_camera() -> Camera {
        Camera::new(
            Vec3::new(0.0, 0.0, 3.0),
            90f32.to_radians(),
            Vec2::new(1280.0, 720.0),
            0.01,
            100.0,
        )
    }

    #[test]
    fn default_heading_looks_down_negative_z() {
        let cam = test_camera();
        let f = cam.forward();
        assert_relative_eq!(f.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(f.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(f.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn view_proj_maps_origin_in_front_of_camera() {
        let cam = test_camera();
        let clip = cam.view_proj() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        // Straight ahead, inside the depth range.
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn update_moves_along_forward() {
        let mut cam = test_camera();
        let mut ctl = CameraController::new();
        ctl.forward = true;
        ctl.move_speed = 2.0;
        ctl.update(0.5, &mut cam);
        assert_relative_eq!(cam.position.z, 2.0, epsilon = 1e-5);
    }
}
