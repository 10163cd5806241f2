use crate::cloud::{CloudUniformStd140, POINT_STRIDE_BYTES};
use crate::renderer::context::GfxContext;

/// Render pipeline for generated clouds: point-list topology over the
/// interleaved position+color vertex buffer, 4x MSAA, depth-tested.
pub struct PointsPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub cloud_layout: wgpu::BindGroupLayout,
}

impl PointsPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        // Per-cloud uniform layout (view-projection + model).
        let cloud_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cloud UBO Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<CloudUniformStd140>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/point_cloud.wgsl"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../../shaders/point_cloud.wgsl").into(),
            ),
        });

        // Interleaved vertex records: position.xyz at 0, color.rgb at 12.
        let vbuf_layout = wgpu::VertexBufferLayout {
            array_stride: POINT_STRIDE_BYTES,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    shader_location: 1,
                    offset: 12,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        };

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Points PipelineLayout"),
            bind_group_layouts: &[&cloud_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Points Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[vbuf_layout],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: sample_count,
                ..Default::default()
            },
            multiview: None,
        });

        Self {
            pipeline,
            cloud_layout,
        }
    }

    /// Binds a cloud's render uniform buffer against this pipeline's
    /// layout.
    pub fn bind_uniform(&self, gfx: &GfxContext, ubo: &wgpu::Buffer) -> wgpu::BindGroup {
        gfx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cloud UBO Bind"),
            layout: &self.cloud_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        })
    }
}
