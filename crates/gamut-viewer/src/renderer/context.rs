use crate::error::{Result, ViewerError};
use std::sync::Arc;
use winit::window::Window;

/// Compute kernels run 256 lanes per workgroup.
pub const WORKGROUP_SIZE: u32 = 256;

/// Holds all GPU resources needed for rendering: the logical device and
/// queue, the canvas surface, and the limits negotiated with the adapter.
pub struct GfxContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    /// Limits actually granted by the device. Point counts can reach
    /// millions × 24 bytes, so storage/buffer sizes are raised to the
    /// adapter's maximum rather than wgpu's conservative defaults.
    pub limits: wgpu::Limits,
}

impl GfxContext {
    /// Creates a new graphics context bound to the given window. Failure
    /// to obtain an adapter or device is fatal and not retried.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

        // The surface must outlive the window; `Arc` guarantees this.
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| ViewerError::UnsupportedPlatform(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                ViewerError::UnsupportedPlatform("no suitable GPU adapter found".into())
            })?;

        // Ask for the adapter's full storage-buffer capacity so large
        // clouds are limited by hardware, not defaults.
        let adapter_limits = adapter.limits();
        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                },
                None, // no trace
            )
            .await
            .map_err(|e| ViewerError::UnsupportedPlatform(e.to_string()))?;

        let limits = device.limits();
        log::info!(
            "GPU context ready: max storage binding {} MiB, max buffer {} MiB",
            limits.max_storage_buffer_binding_size as u64 / (1024 * 1024),
            limits.max_buffer_size / (1024 * 1024),
        );

        // Determine the surface format (prefer sRGB).
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo, // V-sync
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            limits,
        })
    }

    /// Resizes the swap chain when the window size changes.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Creates an uninitialized buffer, failing loudly if the requested
    /// size exceeds the negotiated device limits.
    pub fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer> {
        let limit = if usage.contains(wgpu::BufferUsages::STORAGE) {
            (self.limits.max_storage_buffer_binding_size as u64).min(self.limits.max_buffer_size)
        } else {
            self.limits.max_buffer_size
        };
        if size > limit {
            return Err(ViewerError::ResourceExhaustion {
                requested: size,
                limit,
            });
        }

        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        }))
    }

    /// Creates a buffer initialized from POD data.
    pub fn create_buffer_init<T: bytemuck::Pod>(
        &self,
        label: &str,
        data: &[T],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage,
            })
    }

    /// Creates a shader module from WGSL source.
    pub fn create_shader_module(&self, label: &str, source: &str) -> wgpu::ShaderModule {
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
    }

    /// Creates a compute pipeline with an explicit binding layout.
    pub fn create_compute_pipeline(
        &self,
        label: &str,
        source: &str,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
    ) -> wgpu::ComputePipeline {
        let module = self.create_shader_module(label, source);
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts,
                push_constant_ranges: &[],
            });

        self.device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                module: &module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            })
    }

    /// Encodes and submits one compute dispatch covering `point_count`
    /// invocations. Completion is asynchronous; ordering against later
    /// render passes is guaranteed by queue submission order.
    pub fn dispatch_compute(
        &self,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        point_count: u32,
    ) {
        let grid = DispatchGrid::for_points(
            point_count,
            self.limits.max_compute_workgroups_per_dimension,
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Generate Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Generate Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(grid.groups_x, grid.groups_y, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Shape of a compute dispatch: one invocation per point, 256 lanes per
/// workgroup, split across x/y when the count exceeds the per-dimension
/// workgroup limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGrid {
    pub groups_x: u32,
    pub groups_y: u32,
    /// Invocations covered by one grid row (`groups_x * 256`); the kernels
    /// use it to linearize `global_invocation_id`.
    pub row_stride: u32,
}

impl DispatchGrid {
    pub fn for_points(point_count: u32, max_groups_per_dim: u32) -> Self {
        let groups = point_count.div_ceil(WORKGROUP_SIZE).max(1);
        let groups_x = groups.min(max_groups_per_dim);
        let groups_y = groups.div_ceil(groups_x);
        Self {
            groups_x,
            groups_y,
            row_stride: groups_x * WORKGROUP_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_counts_fit_one_row() {
        let g = DispatchGrid::for_points(1000, 65535);
        assert_eq!(g, DispatchGrid { groups_x: 4, groups_y: 1, row_stride: 1024 });
    }

    #[test]
    fn zero_points_still_dispatches_one_group() {
        let g = DispatchGrid::for_points(0, 65535);
        assert_eq!((g.groups_x, g.groups_y), (1, 1));
    }

    #[test]
    fn large_counts_wrap_into_rows() {
        // 256^3 points needs 65536 groups, one more than a row holds.
        let g = DispatchGrid::for_points(256 * 256 * 256, 65535);
        assert_eq!(g.groups_x, 65535);
        assert_eq!(g.groups_y, 2);
        assert_eq!(g.row_stride, 65535 * WORKGROUP_SIZE);
        // The grid must cover every point.
        let capacity = g.groups_x as u64 * g.groups_y as u64 * WORKGROUP_SIZE as u64;
        assert!(capacity >= 256 * 256 * 256);
    }
}
