//! Image decoding, resizing and conversion to the network's planar layout.
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail, ensure};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use sample_common::Dims;

/// Decoded pixels, three interleaved byte channels stored in (b, g, r)
/// order the way a BGR decoder lays them out.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelGrid(RgbImage);

impl PixelGrid {
    pub fn from_bgr(width: u32, height: u32, bgr: Vec<u8>) -> Result<PixelGrid> {
        let expected = width as usize * height as usize * 3;
        let got = bgr.len();
        match RgbImage::from_raw(width, height, bgr) {
            Some(image) => Ok(PixelGrid(image)),
            None => bail!("{width}x{height} pixel grid needs {expected} bytes, got {got}"),
        }
    }

    pub fn from_image(image: DynamicImage) -> PixelGrid {
        let mut image = image.to_rgb8();
        for pixel in image.pixels_mut() {
            pixel.0.swap(0, 2);
        }
        PixelGrid(image)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Channels at (x, y), in storage order.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.0.get_pixel(x, y).0
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width() != width || self.height() != height {
            self.0 = imageops::resize(&self.0, width, height, FilterType::Triangle);
        }
    }
}

#[derive(Debug)]
pub enum PreprocessError {
    Decode { path: PathBuf, source: image::ImageError },
    Empty(PathBuf),
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PreprocessError::Decode { path, .. } => write!(f, "Cannot open image {path:?}"),
            PreprocessError::Empty(path) => write!(f, "Image {path:?} has no pixels"),
        }
    }
}

impl std::error::Error for PreprocessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PreprocessError::Decode { source, .. } => Some(source),
            PreprocessError::Empty(_) => None,
        }
    }
}

/// Decodes `path` and resizes it to the network's spatial size.
pub fn read_image(
    path: impl AsRef<Path>,
    height: usize,
    width: usize,
) -> Result<PixelGrid, PreprocessError> {
    let path = path.as_ref();
    let image = image::open(path)
        .map_err(|source| PreprocessError::Decode { path: path.to_path_buf(), source })?;
    let mut grid = PixelGrid::from_image(image);
    if grid.width() == 0 || grid.height() == 0 {
        return Err(PreprocessError::Empty(path.to_path_buf()));
    }
    info!("{:?} 3x{}x{} HWC original", path, grid.height(), grid.width());
    grid.resize(width as u32, height as u32);
    info!("{:?} 3x{}x{} HWC resized", path, grid.height(), grid.width());
    Ok(grid)
}

/// Shape of the network input, batch included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputGeometry {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl InputGeometry {
    /// NCHW for rank 4, CHW with an implicit batch of one for rank 3.
    pub fn from_dims(dims: &Dims) -> Result<InputGeometry> {
        let geometry = match *dims.as_slice() {
            [batch, channels, height, width] => InputGeometry { batch, channels, height, width },
            [channels, height, width] => InputGeometry { batch: 1, channels, height, width },
            _ => bail!("Expected a CHW or NCHW input, got {}", dims),
        };
        ensure!(geometry.channels == 3, "Expected 3 input channels, got {}", dims);
        ensure!(
            geometry.batch > 0 && geometry.height > 0 && geometry.width > 0,
            "Degenerate input {}",
            dims
        );
        Ok(geometry)
    }

    pub fn image_volume(&self) -> usize {
        self.channels * self.height * self.width
    }
}

/// Writes one image as planar RGB floats in [0, 1]: storage channel 2 goes
/// to plane 0, channel 1 to plane 1, channel 0 to plane 2.
pub fn fill_planar(grid: &PixelGrid, dst: &mut [f32]) -> Result<()> {
    let (height, width) = (grid.height() as usize, grid.width() as usize);
    let plane = height * width;
    ensure!(
        dst.len() == 3 * plane,
        "Destination holds {} floats, a {}x{} image needs {}",
        dst.len(),
        height,
        width,
        3 * plane
    );
    for (x, y, pixel) in grid.0.enumerate_pixels() {
        let at = y as usize * width + x as usize;
        let [c0, c1, c2] = pixel.0;
        dst[at] = f32::from(c2) / 255.0;
        dst[plane + at] = f32::from(c1) / 255.0;
        dst[2 * plane + at] = f32::from(c0) / 255.0;
    }
    Ok(())
}

/// Lays out a batch of images back to back. Slots without an image are
/// zeroed.
pub fn fill_batch(grids: &[PixelGrid], geometry: &InputGeometry, dst: &mut [f32]) -> Result<()> {
    let volume = geometry.image_volume();
    ensure!(dst.len() == geometry.batch * volume, "Input buffer does not match {:?}", geometry);
    ensure!(
        grids.len() <= geometry.batch,
        "{} images do not fit in a batch of {}",
        grids.len(),
        geometry.batch
    );
    for (ix, slot) in dst.chunks_mut(volume).enumerate() {
        match grids.get(ix) {
            Some(grid) => {
                ensure!(
                    grid.height() as usize == geometry.height
                        && grid.width() as usize == geometry.width,
                    "Image {} is {}x{}, network expects {}x{}",
                    ix,
                    grid.height(),
                    grid.width(),
                    geometry.height,
                    geometry.width
                );
                fill_planar(grid, slot)?;
            }
            None => slot.fill(0.0),
        }
    }
    Ok(())
}
