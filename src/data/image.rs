use std::path::Path;

use image::imageops::FilterType;

use crate::error::{CrowdError, Result};
use crate::math::grid::Grid;

/// Spatial dimensions are rounded down to a multiple of this.
pub const SIZE_MULTIPLE: u32 = 4;

/// Opens an image as grayscale and resizes it so both sides are multiples of
/// [`SIZE_MULTIPLE`]. Pixel values stay in `[0, 255]`.
pub fn load_grayscale(path: &Path) -> Result<Grid> {
    let img = image::open(path).map_err(|source| CrowdError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    let (w1, h1) = (round_down(w), round_down(h));
    let gray = if (w1, h1) != (w, h) {
        image::imageops::resize(&gray, w1, h1, FilterType::Triangle)
    } else {
        gray
    };
    let data = gray.pixels().map(|p| p.0[0] as f64).collect();
    Grid::from_vec(h1 as usize, w1 as usize, data)
}

fn round_down(v: u32) -> u32 {
    ((v / SIZE_MULTIPLE) * SIZE_MULTIPLE).max(SIZE_MULTIPLE)
}
