use crate::{
    camera::{Camera, CameraController},
    cloud::ColorSpace,
    renderer::Renderer,
};
use anyhow::Result;
use glam::{Vec2, Vec3};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    event::{ElementState, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

/// Grid resolutions reachable with the bracket keys.
const MIN_RESOLUTION: u32 = 2;
const MAX_RESOLUTION: u32 = 512;

pub struct App {
    pub renderer: Renderer,
    pub camera: Camera,
    pub camera_controller: CameraController,
    last_frame: Option<Instant>,
}

impl App {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let renderer = Renderer::new(window.clone()).await?;
        let size = renderer.gfx.size;

        // First-person camera just outside the unit cloud.
        let camera = Camera::new(
            Vec3::new(0.0, 0.0, 3.0),
            90f32.to_radians(),
            Vec2::new(size.width as f32, size.height as f32),
            0.01,
            100.0,
        );

        Ok(Self {
            renderer,
            camera,
            camera_controller: CameraController::new(),
            last_frame: None,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            self.camera.set_resolution(new_size.width, new_size.height);
        }
    }

    /// Forwards window events to the camera controls and the command
    /// keybindings. Returns true when the event was consumed.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        if self.camera_controller.handle_event(event, &mut self.camera) {
            return true;
        }

        match event {
            WindowEvent::Resized(physical_size) => {
                self.resize(*physical_size);
                true
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                self.handle_command_key(event.physical_key)
            }
            _ => false,
        }
    }

    fn handle_command_key(&mut self, key: PhysicalKey) -> bool {
        let result = match key {
            PhysicalKey::Code(KeyCode::Digit1) => self.renderer.set_color_space(ColorSpace::Srgb),
            PhysicalKey::Code(KeyCode::Digit2) => self.renderer.set_color_space(ColorSpace::Cieluv),
            PhysicalKey::Code(KeyCode::KeyR) => {
                let on = !self.renderer.animate_rotation;
                self.renderer.toggle_rotation(on);
                log::info!("rotation {}", if on { "on" } else { "off" });
                Ok(())
            }
            PhysicalKey::Code(KeyCode::BracketLeft) => {
                let halved = (self.renderer.resolution() / 2).max(MIN_RESOLUTION);
                self.renderer.update_resolution(halved)
            }
            PhysicalKey::Code(KeyCode::BracketRight) => {
                let doubled = (self.renderer.resolution() * 2).min(MAX_RESOLUTION);
                self.renderer.update_resolution(doubled)
            }
            PhysicalKey::Code(KeyCode::KeyX) => self.renderer.attach_pixel_source(None),
            _ => return false,
        };

        // Errors keep the prior state; surface them and carry on.
        if let Err(err) = result {
            log::error!("command failed: {err}");
        }
        true
    }

    /// Renders one frame. The frame delta drives camera movement and the
    /// idle rotation.
    pub fn render(&mut self) -> std::result::Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        self.camera_controller.update(dt, &mut self.camera);

        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer.render(&swap_view, &self.camera, dt);
        frame.present();

        Ok(())
    }
}
