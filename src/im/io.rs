use super::core::{Im, LabelIm, LabelVol, Lum8Im, Vol};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Pixel depth for written label planes. Always chosen by the caller, never inferred
/// from the data; a label that doesn't fit is an error rather than a silent wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    Eight,
    #[default]
    Sixteen,
    /// 32-bit ids packed little-endian into the four RGBA8 channels.
    Rgba,
}

impl BitDepth {
    pub fn max_value(self) -> u32 {
        match self {
            BitDepth::Eight => u8::MAX as u32,
            BitDepth::Sixteen => u16::MAX as u32,
            BitDepth::Rgba => u32::MAX,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BitDepth::Eight => "8-bit",
            BitDepth::Sixteen => "16-bit",
            BitDepth::Rgba => "RGBA",
        }
    }
}

// Helpers for u32 PNG packing/unpacking
// -----------------------------------------------------------------------------
fn dim_mismatch_err() -> image::ImageError {
    image::ImageError::Parameter(image::error::ParameterError::from_kind(
        image::error::ParameterErrorKind::DimensionMismatch,
    ))
}

fn pack_u32_as_rgba8(pixels: &[u32]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::with_capacity(pixels.len() * 4);
    for v in pixels {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn unpack_rgba8_as_u32(raw_rgba: &[u8]) -> Result<Vec<u32>> {
    if raw_rgba.len() % 4 != 0 {
        return Err(dim_mismatch_err().into());
    }

    let mut out: Vec<u32> = Vec::with_capacity(raw_rgba.len() / 4);
    for px in raw_rgba.chunks_exact(4) {
        out.push(u32::from_le_bytes([px[0], px[1], px[2], px[3]]));
    }
    Ok(out)
}

fn check_depth(arr: &[u32], depth: BitDepth) -> Result<()> {
    let max = arr.iter().copied().max().unwrap_or(0);
    if max > depth.max_value() {
        return Err(Error::BitDepth {
            value: max,
            depth: depth.name(),
        });
    }
    Ok(())
}

// PNG I/O
// -----------------------------------------------------------------------------
impl Lum8Im {
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let img = image::GrayImage::from_raw(self.w as u32, self.h as u32, self.arr.clone())
            .ok_or_else(dim_mismatch_err)?;

        img.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }

    /// Load any PNG as 8-bit gray.
    pub fn load_png<P: AsRef<Path>>(path: P) -> Result<Self> {
        let img = image::open(path)?.into_luma8();
        let (w, h) = (img.width() as usize, img.height() as usize);
        Lum8Im::from_raw(w, h, img.into_raw())
    }
}

impl Im<u32, 1> {
    pub fn save_png<P: AsRef<Path>>(&self, path: P, depth: BitDepth) -> Result<()> {
        check_depth(&self.arr, depth)?;
        let (w, h) = (self.w as u32, self.h as u32);

        match depth {
            BitDepth::Eight => {
                let raw: Vec<u8> = self.arr.iter().map(|&v| v as u8).collect();
                image::GrayImage::from_raw(w, h, raw)
                    .ok_or_else(dim_mismatch_err)?
                    .save_with_format(path, image::ImageFormat::Png)?;
            }
            BitDepth::Sixteen => {
                let raw: Vec<u16> = self.arr.iter().map(|&v| v as u16).collect();
                image::ImageBuffer::<image::Luma<u16>, _>::from_raw(w, h, raw)
                    .ok_or_else(dim_mismatch_err)?
                    .save_with_format(path, image::ImageFormat::Png)?;
            }
            BitDepth::Rgba => {
                // PNG has no 32-bit single channel integer format, so pack the id bytes.
                let raw = pack_u32_as_rgba8(&self.arr);
                image::RgbaImage::from_raw(w, h, raw)
                    .ok_or_else(dim_mismatch_err)?
                    .save_with_format(path, image::ImageFormat::Png)?;
            }
        }
        Ok(())
    }

    /// Load a label plane. 8-bit and 16-bit gray are read as-is, RGBA8 is unpacked
    /// as little-endian 32-bit ids; anything else is converted to 16-bit gray.
    pub fn load_png<P: AsRef<Path>>(path: P) -> Result<Self> {
        let img = image::open(path)?;
        let w = img.width() as usize;
        let h = img.height() as usize;

        let arr: Vec<u32> = match img {
            image::DynamicImage::ImageLuma8(buf) => {
                buf.into_raw().into_iter().map(u32::from).collect()
            }
            image::DynamicImage::ImageLuma16(buf) => {
                buf.into_raw().into_iter().map(u32::from).collect()
            }
            image::DynamicImage::ImageRgba8(buf) => unpack_rgba8_as_u32(&buf.into_raw())?,
            other => other.into_luma16().into_raw().into_iter().map(u32::from).collect(),
        };

        LabelIm::from_raw(w, h, arr)
    }
}

// Plane stacks
// -----------------------------------------------------------------------------

fn plane_path(dir: &Path, prefix: &str, z: usize) -> PathBuf {
    dir.join(format!("{prefix}.{z:05}.png"))
}

/// Write one PNG per plane as `{dir}/{prefix}.NNNNN.png`.
pub fn save_stack(vol: &LabelVol, dir: &Path, prefix: &str, depth: BitDepth) -> Result<()> {
    check_depth(&vol.arr, depth)?;
    std::fs::create_dir_all(dir)?;
    for z in 0..vol.d {
        vol.plane(z).save_png(plane_path(dir, prefix, z), depth)?;
    }
    Ok(())
}

pub fn save_gray_stack(vol: &Vol<u8>, dir: &Path, prefix: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for z in 0..vol.d {
        vol.plane(z).save_png(plane_path(dir, prefix, z))?;
    }
    Ok(())
}

/// Every `.png` in `dir`, sorted by file name.
pub fn list_pngs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Load every `.png` in `dir` (name order) as one plane of a label volume.
pub fn load_stack(dir: &Path) -> Result<LabelVol> {
    let planes = list_pngs(dir)?
        .iter()
        .map(LabelIm::load_png)
        .collect::<Result<Vec<_>>>()?;
    LabelVol::from_planes(&planes)
}

pub fn load_gray_stack(dir: &Path) -> Result<Vol<u8>> {
    let planes = list_pngs(dir)?
        .iter()
        .map(Lum8Im::load_png)
        .collect::<Result<Vec<_>>>()?;
    Vol::from_planes(&planes)
}

// Tests
// -----------------------------------------------------------------------------
