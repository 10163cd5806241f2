use crate::error::{Result, ViewerError};
use crate::renderer::context::GfxContext;
use ppm3::PpmImage;

/// An externally decoded image resident in GPU memory as packed RGBA8
/// words. Generators read it; only the orchestrator replaces or retires
/// it, and its buffer is never freed synchronously while frames may still
/// be in flight.
pub struct PixelSource {
    pub width: u32,
    pub height: u32,
    /// Maximum sample value declared by the decoder. Metadata only.
    pub maxval: u32,
    pub buffer: wgpu::Buffer,
}

impl PixelSource {
    /// Uploads a decoded image. A byte length that is not a multiple of
    /// the 4-byte pixel stride is trimmed, not rejected; the trailing
    /// bytes are dropped with a warning.
    pub fn upload(gfx: &GfxContext, image: &PpmImage) -> Result<Self> {
        let trimmed = trimmed_len(image.data.len());
        if trimmed == 0 {
            return Err(ViewerError::MalformedInput(
                "pixel source holds no complete pixels".into(),
            ));
        }
        if trimmed != image.data.len() {
            log::warn!(
                "pixel source length {} is not a multiple of 4; dropping {} trailing bytes",
                image.data.len(),
                image.data.len() - trimmed
            );
        }

        let buffer = gfx.create_buffer(
            "Pixel Source",
            trimmed as u64,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        )?;
        gfx.queue.write_buffer(&buffer, 0, &image.data[..trimmed]);

        log::info!(
            "uploaded pixel source: {}x{}, {} bytes",
            image.width,
            image.height,
            trimmed
        );

        Ok(Self {
            width: image.width,
            height: image.height,
            maxval: image.maxval,
            buffer,
        })
    }

    /// Number of points an image-derived generator will produce.
    #[inline]
    pub fn point_count(&self) -> u32 {
        self.width * self.height
    }
}

/// Largest prefix of `len` that holds whole RGBA8 pixels.
#[inline]
pub fn trimmed_len(len: usize) -> usize {
    len - len % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_to_pixel_stride() {
        assert_eq!(trimmed_len(4 * 7 + 2), 4 * 7);
        assert_eq!(trimmed_len(4 * 7), 4 * 7);
        assert_eq!(trimmed_len(3), 0);
        assert_eq!(trimmed_len(0), 0);
    }
}
