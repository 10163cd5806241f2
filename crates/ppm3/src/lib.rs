//! PPM3: dependency-free decoder for the plain-text PPM "P3" image format.
//!
//! - Produces a packed RGBA8 pixel record; alpha is forced to 255.
//! - `data.len()` is always `width * height * 4` (≡ 0 mod 4).
//! - `maxval` is retained as metadata; samples above 255 are clamped
//!   rather than rescaled.
//!
//! File layout (ASCII, whitespace-separated):
//!   "P3"                      magic
//!   width height              image dimensions
//!   maxval                    maximum sample value
//!   r g b r g b ...           width*height RGB triplets
//!
//! `#` starts a comment that runs to the end of the line and may appear
//! anywhere whitespace may.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

pub const PPM_MAGIC: &str = "P3";

/// A decoded P3 image as packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpmImage {
    pub width: u32,
    pub height: u32,
    /// Maximum sample value declared by the file. Metadata only.
    pub maxval: u32,
    /// Packed RGBA8 pixels, row-major, alpha always 255.
    pub data: Vec<u8>,
}

impl PpmImage {
    /// Number of pixels in the image.
    #[inline]
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

fn bad(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg)
}

/// Splits the source into numeric tokens, dropping `#` comments.
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(|line| line.split_ascii_whitespace())
}

/// Parses a plain-text P3 image into a packed RGBA8 record.
pub fn parse_p3(text: &str) -> io::Result<PpmImage> {
    let mut toks = tokens(text);

    match toks.next() {
        Some(PPM_MAGIC) => {}
        Some(other) => return Err(bad(&format!("expected P3 magic, found {:?}", other))),
        None => return Err(bad("empty PPM source")),
    }

    let mut header = |name: &str| -> io::Result<u32> {
        toks.next()
            .ok_or_else(|| bad(&format!("missing {}", name)))?
            .parse::<u32>()
            .map_err(|_| bad(&format!("invalid {}", name)))
    };

    let width = header("width")?;
    let height = header("height")?;
    let maxval = header("maxval")?;

    if width == 0 || height == 0 {
        return Err(bad("zero image dimension"));
    }
    if maxval == 0 {
        return Err(bad("zero maxval"));
    }

    let pixel_count = width as usize * height as usize;
    let mut data = Vec::with_capacity(pixel_count * 4);

    for _ in 0..pixel_count {
        for channel in ["red", "green", "blue"] {
            let sample = toks
                .next()
                .ok_or_else(|| bad("truncated pixel data"))?
                .parse::<u32>()
                .map_err(|_| bad(&format!("invalid {} sample", channel)))?;
            data.push(sample.min(255) as u8);
        }
        data.push(255);
    }

    Ok(PpmImage {
        width,
        height,
        maxval,
        data,
    })
}

/// Reads and parses a P3 file from disk.
pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<PpmImage> {
    let text = fs::read_to_string(path)?;
    parse_p3(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: &str = "P3\n2 1\n255\n255 0 0  0 255 0\n";

    #[test]
    fn parses_basic_image() {
        let img = parse_p3(TINY).unwrap();
        assert_eq!((img.width, img.height, img.maxval), (2, 1, 255));
        assert_eq!(img.data, vec![255, 0, 0, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn data_length_is_multiple_of_four() {
        let img = parse_p3(TINY).unwrap();
        assert_eq!(img.data.len(), img.pixel_count() as usize * 4);
        assert_eq!(img.data.len() % 4, 0);
    }

    #[test]
    fn skips_comments_anywhere() {
        let src = "P3 # magic\n# a full comment line\n1 1 # dims\n255\n1 2 3\n";
        let img = parse_p3(src).unwrap();
        assert_eq!(img.data, vec![1, 2, 3, 255]);
    }

    #[test]
    fn rejects_wrong_magic() {
        assert!(parse_p3("P6\n1 1\n255\n0 0 0\n").is_err());
        assert!(parse_p3("").is_err());
    }

    #[test]
    fn rejects_truncated_pixels() {
        let err = parse_p3("P3\n2 2\n255\n1 2 3\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn clamps_samples_above_255() {
        let img = parse_p3("P3\n1 1\n1023\n1023 0 512\n").unwrap();
        assert_eq!(img.maxval, 1023);
        assert_eq!(img.data, vec![255, 0, 255, 255]);
    }

    #[test]
    fn rejects_degenerate_dimensions() {
        assert!(parse_p3("P3\n0 4\n255\n").is_err());
        assert!(parse_p3("P3\n4 4\n0\n").is_err());
    }
}
