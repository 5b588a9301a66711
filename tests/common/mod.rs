#![allow(dead_code)]

use std::path::{Path, PathBuf};

use crowd_mtl::data::csv::write_density_csv;
use crowd_mtl::Grid;
use image::{GrayImage, Luma};

pub struct Dataset {
    pub images: PathBuf,
    pub gt: PathBuf,
}

/// Writes `counts.len()` 8x8 PNG images with matching 8x8 density CSVs
/// whose mass equals the given counts.
pub fn write_dataset(root: &Path, counts: &[f64]) -> Dataset {
    let images = root.join("images");
    let gt = root.join("gt");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::create_dir_all(&gt).unwrap();
    for (i, &count) in counts.iter().enumerate() {
        let stem = format!("IMG_{}", i + 1);
        let img = GrayImage::from_fn(8, 8, |x, y| Luma([((x * 16 + y * 8 + i as u32 * 20) % 256) as u8]));
        img.save(images.join(format!("{}.png", stem))).unwrap();
        let mut density = Grid::zeros(8, 8);
        density.set(i % 8, (i * 3) % 8, count * 0.75);
        density.set(7 - i % 8, 4, count * 0.25);
        write_density_csv(&gt.join(format!("{}.csv", stem)), &density).unwrap();
    }
    Dataset { images, gt }
}
