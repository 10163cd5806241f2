//! The frame orchestrator. Owns the GPU context, render targets, the
//! points pipeline, the single active point cloud, and the attached pixel
//! source, and drives the per-frame acquire → encode → submit cycle.

pub mod context;
pub mod pipelines;
pub mod retire;
pub mod targets;

use self::{
    context::GfxContext,
    pipelines::points::PointsPipeline,
    retire::RetirementQueue,
    targets::{Targets, SAMPLE_COUNT},
};
use crate::camera::Camera;
use crate::cloud::{CloudDims, ColorSpace, PixelSource, PointCloud};
use crate::color::Color;
use crate::error::Result;
use ppm3::PpmImage;
use std::sync::Arc;
use winit::window::Window;

pub const DEFAULT_RESOLUTION: u32 = 128;

/// Idle spin applied to the active cloud, radians per second around Y.
const ROTATION_RATE: f32 = 0.2;

pub struct Renderer {
    pub gfx: GfxContext,
    pub targets: Targets,
    pub points: PointsPipeline,

    // Scene state: exactly one active cloud, at most one pixel source.
    cloud: PointCloud,
    pixel_source: Option<PixelSource>,
    retire: RetirementQueue<wgpu::Buffer>,

    background: wgpu::Color,
    frame_count: u64,
    pub animate_rotation: bool,
    color_space: ColorSpace,
    resolution: u32,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let targets = Targets::new(&gfx.device, gfx.config.format, gfx.size);
        let points = PointsPipeline::new(
            &gfx.device,
            gfx.config.format,
            targets.depth_fmt,
            SAMPLE_COUNT,
        );

        let color_space = ColorSpace::Cieluv;
        let resolution = DEFAULT_RESOLUTION;
        let mut cloud = PointCloud::new(color_space, resolution, None, &gfx.limits)?;
        cloud.generate(&gfx, None, &points)?;

        Ok(Self {
            gfx,
            targets,
            points,
            cloud,
            pixel_source: None,
            retire: RetirementQueue::new(),
            background: wgpu::Color {
                r: 0.5,
                g: 0.5,
                b: 0.5,
                a: 1.0,
            },
            frame_count: 0,
            animate_rotation: true,
            color_space,
            resolution,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.targets
                .resize(&self.gfx.device, self.gfx.config.format, new_size);
        }
    }

    /// Encodes and submits one frame: clear the MSAA and depth targets,
    /// draw the active cloud resolved into the swap view, then advance the
    /// rotation and the frame counter. Fire-and-forget; the loop never
    /// blocks on GPU completion.
    pub fn render(&mut self, swap_view: &wgpu::TextureView, camera: &Camera, dt: f32) {
        self.cloud.write_uniform(&self.gfx.queue, camera.view_proj());

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.msaa,
                    resolve_target: Some(swap_view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.cloud.render(&mut pass, &self.points);
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));

        if self.animate_rotation {
            self.cloud.rotate(0.0, dt * ROTATION_RATE, 0.0);
        }

        // Tie everything retired this frame to the submission that just
        // went out, then free whatever older submissions have confirmed.
        if let Some(mark) = self.retire.seal() {
            self.gfx.queue.on_submitted_work_done(move || mark.complete());
        }
        self.retire.sweep();

        self.frame_count += 1;
        if self.frame_count == u64::MAX {
            self.frame_count = 0;
        }
    }

    /// Switches the declared color space, regenerating the active cloud.
    /// On failure the previous cloud remains displayed.
    pub fn set_color_space(&mut self, space: ColorSpace) -> Result<()> {
        self.rebuild_cloud(space, self.resolution)
    }

    /// Changes the procedural grid resolution, regenerating the active
    /// cloud. On failure the previous cloud remains displayed.
    pub fn update_resolution(&mut self, resolution: u32) -> Result<()> {
        self.rebuild_cloud(self.color_space, resolution)
    }

    /// Attaches a decoded image (or detaches with `None`) and regenerates
    /// the active cloud against the new source state. A replaced GPU
    /// buffer is retired, never freed synchronously.
    pub fn attach_pixel_source(&mut self, image: Option<&PpmImage>) -> Result<()> {
        match image {
            Some(img) => {
                // Validate the cloud the new source implies before any
                // state changes, so a rejected image leaves both the old
                // source and the old cloud in place.
                CloudDims::plan(
                    self.resolution,
                    Some((img.width, img.height)),
                    &self.gfx.limits,
                )?;
                let fresh = PixelSource::upload(&self.gfx, img)?;
                if let Some(old) = self.pixel_source.replace(fresh) {
                    self.retire.retire([old.buffer]);
                }
            }
            None => {
                if let Some(old) = self.pixel_source.take() {
                    log::info!("detached pixel source");
                    self.retire.retire([old.buffer]);
                }
            }
        }
        self.rebuild_cloud(self.color_space, self.resolution)
    }

    pub fn set_bg_color(&mut self, color: Color) {
        self.background = color.into();
    }

    pub fn toggle_rotation(&mut self, on: bool) {
        self.animate_rotation = on;
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn point_count(&self) -> u32 {
        self.cloud.num_points()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn has_pixel_source(&self) -> bool {
        self.pixel_source.is_some()
    }

    /// Replacement protocol: construct and generate the new variant
    /// first, and only on success retire the old one and swap. No frame
    /// ever observes a half-constructed cloud; the swap happens between
    /// frames.
    fn rebuild_cloud(&mut self, space: ColorSpace, resolution: u32) -> Result<()> {
        let source_dims = self.pixel_source.as_ref().map(|s| (s.width, s.height));
        let mut fresh = PointCloud::new(space, resolution, source_dims, &self.gfx.limits)?;
        fresh.generate(&self.gfx, self.pixel_source.as_ref(), &self.points)?;

        let mut old = std::mem::replace(&mut self.cloud, fresh);
        self.retire.retire(old.destroy());

        self.color_space = space;
        self.resolution = resolution;
        log::info!(
            "active cloud: {} ({} points)",
            self.cloud.kind().label(),
            self.cloud.num_points()
        );
        Ok(())
    }
}
