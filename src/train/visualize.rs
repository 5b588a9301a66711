use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};

use crate::error::{CrowdError, Result};
use crate::math::grid::Grid;

/// File the display cadence overwrites on every dump.
pub const RESULTS_FILE: &str = "results.png";

/// Writes `input | ground truth | prediction` side by side as one grayscale
/// PNG in `output_dir`.
///
/// Each density map is scaled to 0–255 by its own maximum and upsampled to
/// the image size when it was predicted at a lower resolution.
pub fn save_results(image: &Grid, gt: &Grid, prediction: &Grid, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| CrowdError::io(output_dir, e))?;
    let panels = [
        image.clone(),
        to_image_scale(gt, image.shape()),
        to_image_scale(prediction, image.shape()),
    ];

    let (rows, cols) = image.shape();
    let mut canvas = GrayImage::new((cols * panels.len()) as u32, rows as u32);
    for (i, panel) in panels.iter().enumerate() {
        for r in 0..rows {
            for c in 0..cols {
                let v = panel.get(r, c).round().clamp(0.0, 255.0) as u8;
                canvas.put_pixel((i * cols + c) as u32, r as u32, Luma([v]));
            }
        }
    }

    let path = output_dir.join(RESULTS_FILE);
    canvas.save(&path).map_err(|source| CrowdError::Image { path: path.clone(), source })?;
    Ok(path)
}

/// `255 · x / max(x)`, brought up to `shape`.
fn to_image_scale(density: &Grid, shape: (usize, usize)) -> Grid {
    let max = density.max();
    let scaled = if max > 0.0 { density.map(|x| 255.0 * x / max) } else { density.map(|_| 0.0) };
    let (rows, cols) = shape;
    if scaled.shape() == shape {
        return scaled;
    }
    if scaled.rows > 0
        && scaled.cols > 0
        && rows % scaled.rows == 0
        && cols % scaled.cols == 0
        && rows / scaled.rows == cols / scaled.cols
    {
        return scaled.upsample_nearest(rows / scaled.rows);
    }
    scaled.resize_bilinear(rows, cols)
}
