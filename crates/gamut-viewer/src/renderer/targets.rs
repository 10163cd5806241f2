//! Multisampled color and depth targets for the frame pass. The surface
//! texture itself is only ever a resolve destination.

pub const SAMPLE_COUNT: u32 = 4;

pub struct Targets {
    // Private textures - keep alive for the lifetime of the views.
    _msaa_tex: wgpu::Texture,
    _depth_tex: wgpu::Texture,

    /// 4x multisampled color target in the surface format.
    pub msaa: wgpu::TextureView,
    /// Multisampled depth target.
    pub depth: wgpu::TextureView,

    pub depth_fmt: wgpu::TextureFormat,
}

impl Targets {
    pub fn new(
        device: &wgpu::Device,
        surface_fmt: wgpu::TextureFormat,
        size: winit::dpi::PhysicalSize<u32>,
    ) -> Self {
        let width = size.width.max(1);
        let height = size.height.max(1);

        let tex_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let depth_fmt = wgpu::TextureFormat::Depth24Plus;

        let create_tex = |label: &str, format| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: tex_size,
                mip_level_count: 1,
                sample_count: SAMPLE_COUNT,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
        };

        let msaa_tex = create_tex("MSAA Color Target", surface_fmt);
        let depth_tex = create_tex("Depth Target", depth_fmt);

        Self {
            msaa: msaa_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            depth: depth_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            _msaa_tex: msaa_tex,
            _depth_tex: depth_tex,
            depth_fmt,
        }
    }

    /// Recreate both targets at the new window size.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        surface_fmt: wgpu::TextureFormat,
        size: winit::dpi::PhysicalSize<u32>,
    ) {
        *self = Self::new(device, surface_fmt, size);
    }
}
