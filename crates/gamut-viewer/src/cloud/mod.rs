//! Point-cloud generators: a closed family of variants that fill a vertex
//! buffer on the GPU, either procedurally from a grid resolution or by
//! transforming an attached pixel source into a target color space.

pub mod pixel_source;
pub mod transform;

pub use self::pixel_source::PixelSource;
pub use self::transform::Transform;

use crate::error::{Result, ViewerError};
use crate::renderer::context::{DispatchGrid, GfxContext};
use crate::renderer::pipelines::points::PointsPipeline;
use bytemuck::Zeroable;
use glam::Mat4;
use std::str::FromStr;

/// Floats per point: position.xyz + color.rgb, interleaved. The layout is
/// fixed after generation and shared with every kernel and the render
/// pipeline.
pub const POINT_STRIDE_FLOATS: u32 = 6;
pub const POINT_STRIDE_BYTES: u64 = POINT_STRIDE_FLOATS as u64 * 4;

/// Declared color space of the active cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    Cieluv,
}

impl FromStr for ColorSpace {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "srgb" => Ok(ColorSpace::Srgb),
            "cieluv" => Ok(ColorSpace::Cieluv),
            other => Err(ViewerError::InvalidConfiguration(format!(
                "unrecognized color space {:?}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorSpace::Srgb => write!(f, "sRGB"),
            ColorSpace::Cieluv => write!(f, "CIELUV"),
        }
    }
}

/// The four cloud variants: (color space) × (procedural vs image-derived).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudKind {
    ProceduralCube,
    ProceduralCieluv,
    ImageCube,
    ImageCieluv,
}

impl CloudKind {
    /// Picks the variant for a color space and whether a pixel source is
    /// attached at construction time.
    pub fn select(space: ColorSpace, has_source: bool) -> Self {
        match (space, has_source) {
            (ColorSpace::Srgb, false) => CloudKind::ProceduralCube,
            (ColorSpace::Cieluv, false) => CloudKind::ProceduralCieluv,
            (ColorSpace::Srgb, true) => CloudKind::ImageCube,
            (ColorSpace::Cieluv, true) => CloudKind::ImageCieluv,
        }
    }

    pub fn is_image_derived(self) -> bool {
        matches!(self, CloudKind::ImageCube | CloudKind::ImageCieluv)
    }

    pub fn label(self) -> &'static str {
        match self {
            CloudKind::ProceduralCube => "Procedural sRGB Cube",
            CloudKind::ProceduralCieluv => "Procedural CIELUV Solid",
            CloudKind::ImageCube => "Image sRGB Cube",
            CloudKind::ImageCieluv => "Image CIELUV Solid",
        }
    }

    /// WGSL source for the variant's compute kernel. The CIELUV kernels
    /// are prepended with the shared conversion chain.
    fn kernel_source(self) -> &'static str {
        match self {
            CloudKind::ProceduralCube => include_str!("../../shaders/procedural_cube.wgsl"),
            CloudKind::ProceduralCieluv => concat!(
                include_str!("../../shaders/cieluv_common.wgsl"),
                include_str!("../../shaders/procedural_cieluv.wgsl"),
            ),
            CloudKind::ImageCube => include_str!("../../shaders/image_cube.wgsl"),
            CloudKind::ImageCieluv => concat!(
                include_str!("../../shaders/cieluv_common.wgsl"),
                include_str!("../../shaders/image_cieluv.wgsl"),
            ),
        }
    }
}

/// Resolved size of a cloud, validated against the negotiated limits
/// before any GPU resource exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudDims {
    /// Grid edge length; for image clouds an approximate cubic resolution
    /// kept as metadata only.
    pub resolution: u32,
    pub num_points: u32,
}

impl CloudDims {
    /// Decides the point count from either the requested resolution or an
    /// attached source's dimensions, and rejects configurations whose
    /// vertex buffer would exceed the device limits.
    pub fn plan(
        resolution: u32,
        source: Option<(u32, u32)>,
        limits: &wgpu::Limits,
    ) -> Result<Self> {
        let (resolution, num_points) = match source {
            Some((w, h)) => {
                let n = w
                    .checked_mul(h)
                    .ok_or_else(|| exhausted(w as u64 * h as u64, limits))?;
                if n == 0 {
                    return Err(ViewerError::InvalidConfiguration(
                        "pixel source has zero pixels".into(),
                    ));
                }
                ((n as f64).sqrt().floor() as u32, n)
            }
            None => {
                if resolution == 0 {
                    return Err(ViewerError::InvalidConfiguration(
                        "grid resolution must be at least 1".into(),
                    ));
                }
                let n = resolution.checked_pow(3).ok_or_else(|| {
                    exhausted((resolution as u64).pow(3), limits)
                })?;
                (resolution, n)
            }
        };

        let bytes = num_points as u64 * POINT_STRIDE_BYTES;
        let limit = storage_limit(limits);
        if bytes > limit {
            return Err(ViewerError::ResourceExhaustion {
                requested: bytes,
                limit,
            });
        }

        Ok(Self {
            resolution,
            num_points,
        })
    }

    pub fn vertex_bytes(&self) -> u64 {
        self.num_points as u64 * POINT_STRIDE_BYTES
    }
}

fn storage_limit(limits: &wgpu::Limits) -> u64 {
    (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size)
}

fn exhausted(points: u64, limits: &wgpu::Limits) -> ViewerError {
    ViewerError::ResourceExhaustion {
        requested: points.saturating_mul(POINT_STRIDE_BYTES),
        limit: storage_limit(limits),
    }
}

/// Dimensions parameter block bound to every kernel. 16 bytes, padded to
/// uniform alignment; must match `Dims` in the WGSL kernels.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DimsStd140 {
    resolution: u32,
    num_points: u32,
    row_stride: u32,
    _pad: u32,
}

/// Per-cloud render uniform; must match `CloudUniform` in
/// `point_cloud.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CloudUniformStd140 {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
}

/// GPU-side state of a generated cloud. Absent until `generate` runs, and
/// taken back out on `destroy`.
struct CloudGpu {
    vertex: wgpu::Buffer,
    dims_ubo: wgpu::Buffer,
    render_ubo: wgpu::Buffer,
    render_bind: wgpu::BindGroup,
    _compute_bind: wgpu::BindGroup,
    _compute_pipeline: wgpu::ComputePipeline,
}

/// One point-cloud variant and its resources. At most one cloud is active
/// at a time; the orchestrator swaps whole instances atomically between
/// frames.
pub struct PointCloud {
    kind: CloudKind,
    dims: CloudDims,
    pub transform: Transform,
    gpu: Option<CloudGpu>,
}

impl PointCloud {
    /// Validates the configuration and builds an ungenerated cloud. No
    /// GPU resource is touched until `generate`.
    pub fn new(
        space: ColorSpace,
        resolution: u32,
        source_dims: Option<(u32, u32)>,
        limits: &wgpu::Limits,
    ) -> Result<Self> {
        let kind = CloudKind::select(space, source_dims.is_some());
        let dims = CloudDims::plan(resolution, source_dims, limits)?;
        Ok(Self {
            kind,
            dims,
            transform: Transform::centered_unit(),
            gpu: None,
        })
    }

    pub fn kind(&self) -> CloudKind {
        self.kind
    }

    pub fn num_points(&self) -> u32 {
        self.dims.num_points
    }

    pub fn resolution(&self) -> u32 {
        self.dims.resolution
    }

    pub fn is_generated(&self) -> bool {
        self.gpu.is_some()
    }

    /// Allocates the vertex buffer and dispatches the variant's kernel,
    /// one invocation per point. The dispatch is fire-and-forget; queue
    /// ordering makes the writes visible to any later render pass.
    pub fn generate(
        &mut self,
        gfx: &GfxContext,
        source: Option<&PixelSource>,
        points: &PointsPipeline,
    ) -> Result<()> {
        let source = match (self.kind.is_image_derived(), source) {
            (true, Some(src)) => Some(src),
            (true, None) => {
                return Err(ViewerError::InvalidConfiguration(
                    "image-derived cloud generated without a pixel source".into(),
                ))
            }
            (false, _) => None,
        };

        let vertex = gfx.create_buffer(
            self.kind.label(),
            self.dims.vertex_bytes(),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX,
        )?;

        let grid = DispatchGrid::for_points(
            self.dims.num_points,
            gfx.limits.max_compute_workgroups_per_dimension,
        );
        let dims_ubo = gfx.create_buffer_init(
            "Cloud Dims UBO",
            &[DimsStd140 {
                resolution: self.dims.resolution,
                num_points: self.dims.num_points,
                row_stride: grid.row_stride,
                _pad: 0,
            }],
            wgpu::BufferUsages::UNIFORM,
        );

        let (layout, bind) = self.build_compute_bind(gfx, &vertex, &dims_ubo, source);
        let pipeline = gfx.create_compute_pipeline(self.kind.label(), self.kind.kernel_source(), &[&layout]);

        let render_ubo = gfx.create_buffer_init(
            "Cloud Render UBO",
            &[CloudUniformStd140::zeroed()],
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let render_bind = points.bind_uniform(gfx, &render_ubo);

        gfx.dispatch_compute(&pipeline, &bind, self.dims.num_points);

        log::info!(
            "generated {}: {} points ({} resolution, {} bytes)",
            self.kind.label(),
            self.dims.num_points,
            self.dims.resolution,
            self.dims.vertex_bytes()
        );

        self.gpu = Some(CloudGpu {
            vertex,
            dims_ubo,
            render_ubo,
            render_bind,
            _compute_bind: bind,
            _compute_pipeline: pipeline,
        });
        Ok(())
    }

    fn build_compute_bind(
        &self,
        gfx: &GfxContext,
        vertex: &wgpu::Buffer,
        dims_ubo: &wgpu::Buffer,
        source: Option<&PixelSource>,
    ) -> (wgpu::BindGroupLayout, wgpu::BindGroup) {
        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let uniform = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        match source {
            Some(src) => {
                let layout =
                    gfx.device
                        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                            label: Some("Image Cloud BGL"),
                            entries: &[storage(0, true), storage(1, false), uniform(2)],
                        });
                let bind = gfx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Image Cloud Bind"),
                    layout: &layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: src.buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: vertex.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: dims_ubo.as_entire_binding(),
                        },
                    ],
                });
                (layout, bind)
            }
            None => {
                let layout =
                    gfx.device
                        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                            label: Some("Procedural Cloud BGL"),
                            entries: &[storage(0, false), uniform(1)],
                        });
                let bind = gfx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Procedural Cloud Bind"),
                    layout: &layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: vertex.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: dims_ubo.as_entire_binding(),
                        },
                    ],
                });
                (layout, bind)
            }
        }
    }

    /// Uploads this frame's view-projection and model matrices.
    pub fn write_uniform(&self, queue: &wgpu::Queue, view_proj: Mat4) {
        if let Some(gpu) = &self.gpu {
            let data = CloudUniformStd140 {
                view_proj: view_proj.to_cols_array_2d(),
                model: self.transform.matrix().to_cols_array_2d(),
            };
            queue.write_buffer(&gpu.render_ubo, 0, bytemuck::bytes_of(&data));
        }
    }

    /// Appends this cloud's draw call to the pass: point-list topology,
    /// one vertex per generated point. A cloud that was never generated
    /// draws nothing.
    pub fn render<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, points: &'a PointsPipeline) {
        if let Some(gpu) = &self.gpu {
            pass.set_pipeline(&points.pipeline);
            pass.set_bind_group(0, &gpu.render_bind, &[]);
            pass.set_vertex_buffer(0, gpu.vertex.slice(..));
            pass.draw(0..self.dims.num_points, 0..1);
        }
    }

    /// Composes an incremental rotation into the transform. Pure state
    /// mutation; no GPU dispatch.
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        self.transform.rotate(dx, dy, dz);
    }

    /// Detaches the cloud's GPU buffers for deferred release. Safe to call
    /// repeatedly or before `generate`; an ungenerated cloud yields
    /// nothing.
    pub fn destroy(&mut self) -> Vec<wgpu::Buffer> {
        match self.gpu.take() {
            Some(gpu) => vec![gpu.vertex, gpu.dims_ubo, gpu.render_ubo],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_limits() -> wgpu::Limits {
        wgpu::Limits::default()
    }

    #[test]
    fn selects_variant_from_space_and_source() {
        assert_eq!(
            CloudKind::select(ColorSpace::Srgb, false),
            CloudKind::ProceduralCube
        );
        assert_eq!(
            CloudKind::select(ColorSpace::Cieluv, false),
            CloudKind::ProceduralCieluv
        );
        assert_eq!(
            CloudKind::select(ColorSpace::Srgb, true),
            CloudKind::ImageCube
        );
        assert_eq!(
            CloudKind::select(ColorSpace::Cieluv, true),
            CloudKind::ImageCieluv
        );
    }

    #[test]
    fn color_space_parses_case_insensitively() {
        assert_eq!("sRGB".parse::<ColorSpace>().unwrap(), ColorSpace::Srgb);
        assert_eq!("CIELUV".parse::<ColorSpace>().unwrap(), ColorSpace::Cieluv);
        assert!(matches!(
            "hsv".parse::<ColorSpace>(),
            Err(ViewerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn plan_cubes_the_resolution() {
        let dims = CloudDims::plan(128, None, &test_limits()).unwrap();
        assert_eq!(dims.resolution, 128);
        assert_eq!(dims.num_points, 128 * 128 * 128);
    }

    #[test]
    fn plan_uses_source_pixel_count() {
        let dims = CloudDims::plan(128, Some((640, 480)), &test_limits()).unwrap();
        assert_eq!(dims.num_points, 640 * 480);
        // Approximate cubic resolution, metadata only.
        assert_eq!(dims.resolution, (640.0f64 * 480.0).sqrt() as u32);
    }

    #[test]
    fn plan_rejects_zero_resolution() {
        assert!(matches!(
            CloudDims::plan(0, None, &test_limits()),
            Err(ViewerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn plan_rejects_empty_source() {
        assert!(matches!(
            CloudDims::plan(16, Some((0, 32)), &test_limits()),
            Err(ViewerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn plan_reports_exhaustion_against_limits() {
        let mut limits = test_limits();
        limits.max_storage_buffer_binding_size = 1024;
        limits.max_buffer_size = 1024;
        let err = CloudDims::plan(16, None, &limits).unwrap_err();
        match err {
            ViewerError::ResourceExhaustion { requested, limit } => {
                assert_eq!(requested, 16 * 16 * 16 * POINT_STRIDE_BYTES);
                assert_eq!(limit, 1024);
            }
            other => panic!("expected ResourceExhaustion, got {other:?}"),
        }
    }

    #[test]
    fn oversized_image_source_is_rejected_before_any_allocation() {
        // Attaching an image validates the implied cloud up front; an
        // image too large for the limits must fail here while a
        // procedural cloud at the same resolution still plans fine.
        let mut limits = test_limits();
        limits.max_storage_buffer_binding_size = 64 * 1024;
        limits.max_buffer_size = 64 * 1024;
        assert!(CloudDims::plan(8, None, &limits).is_ok());
        assert!(matches!(
            CloudDims::plan(8, Some((4096, 4096)), &limits),
            Err(ViewerError::ResourceExhaustion { .. })
        ));
    }

    #[test]
    fn degenerate_single_point_grid_is_valid() {
        let dims = CloudDims::plan(1, None, &test_limits()).unwrap();
        assert_eq!(dims.num_points, 1);
    }

    #[test]
    fn destroy_is_idempotent_and_safe_before_generate() {
        let mut cloud = PointCloud::new(ColorSpace::Srgb, 8, None, &test_limits()).unwrap();
        assert!(!cloud.is_generated());
        assert!(cloud.destroy().is_empty());
        assert!(cloud.destroy().is_empty());
    }

    /// CPU mirror of the procedural kernel's index -> grid mapping.
    fn grid_cell(index: u32, r: u32) -> [f32; 3] {
        let denom = (r - 1).max(1) as f32;
        [
            (index % r) as f32 / denom,
            ((index / r) % r) as f32 / denom,
            (index / (r * r)) as f32 / denom,
        ]
    }

    #[test]
    fn grid_mapping_covers_unit_cube() {
        let r = 4u32;
        for index in 0..r * r * r {
            let c = grid_cell(index, r);
            for v in c {
                assert!((0.0..=1.0).contains(&v));
            }
        }
        // Last index reaches the far corner.
        assert_eq!(grid_cell(r * r * r - 1, r), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn single_point_grid_sits_at_origin() {
        assert_eq!(grid_cell(0, 1), [0.0, 0.0, 0.0]);
    }
}
