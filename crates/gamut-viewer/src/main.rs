//! Entry point for the color-space visualizer.
//!
//! Usage: gamut-viewer [IMAGE.ppm] [#RRGGBB]
//!
//! An optional plain-text PPM (P3) image becomes the point-cloud data
//! source; an optional hex color overrides the background.

use anyhow::Result;
use gamut_viewer::{app::App, color::hex2rgb};
use std::sync::Arc;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Create the event loop and window.
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Gamut Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720))
            .build(&event_loop)?,
    );

    // Initialise the application (async → sync).
    let mut app = pollster::block_on(App::new(window.clone()))?;

    let mut args = std::env::args().skip(1);

    // Optional PPM image as the pixel source.
    if let Some(path) = args.next() {
        match ppm3::read_file(&path) {
            Ok(image) => {
                if let Err(err) = app.renderer.attach_pixel_source(Some(&image)) {
                    log::error!("Failed to attach {}: {}", path, err);
                }
            }
            Err(err) => log::error!("Failed to read {}: {}", path, err),
        }
    }

    // Optional background color override.
    if let Some(hex) = args.next() {
        match hex2rgb(&hex) {
            Ok(color) => app.renderer.set_bg_color(color),
            Err(err) => log::error!("{}", err),
        }
    }

    // Run the winit event loop.
    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                // Forward events to the app; handle unconsumed window events.
                if !app.handle_event(&event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                                elwt.exit();
                            }
                        }
                        WindowEvent::RedrawRequested => match app.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => {
                                app.resize(app.renderer.gfx.size);
                            }
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                log::error!("WGPU out of memory – exiting.");
                                elwt.exit();
                            }
                            Err(e) => log::error!("Render error: {:?}", e),
                        },
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                // Request a redraw each frame.
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
