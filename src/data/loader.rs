use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::blob::{one_hot, Blob};
use crate::data::csv::read_density_csv;
use crate::data::image::load_grayscale;
use crate::data::labels::{ClassWeights, CountClasses};
use crate::error::{CrowdError, MismatchReport, Result};
use crate::math::grid::Grid;

/// Ground truth is pooled by this factor when `gt_downsample` is set.
pub const DOWNSAMPLE_FACTOR: usize = 4;

/// Loader behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Fresh random order on every pass.
    pub shuffle: bool,
    /// Density maps at `1 / DOWNSAMPLE_FACTOR` of the image size.
    pub gt_downsample: bool,
    /// Decode every sample at construction.
    pub pre_load: bool,
    pub num_classes: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions { shuffle: true, gt_downsample: false, pre_load: true, num_classes: 10 }
    }
}

impl LoaderOptions {
    pub fn downsample_factor(&self) -> usize {
        if self.gt_downsample { DOWNSAMPLE_FACTOR } else { 1 }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    fname: String,
    image_path: PathBuf,
    gt_path: PathBuf,
    gt_class: usize,
}

/// Paired image / density-map dataset read from two directories.
///
/// Image `stem.ext` pairs with `stem.csv` in the ground-truth directory.
/// Any unpaired file on either side fails construction with a
/// [`MismatchReport`].
pub struct ImageDataLoader {
    image_dir: PathBuf,
    options: LoaderOptions,
    entries: Vec<Entry>,
    blobs: Option<Vec<Blob>>,
    classes: CountClasses,
    class_hist: Vec<usize>,
    class_weights: ClassWeights,
}

impl ImageDataLoader {
    pub fn new(image_dir: &Path, gt_dir: &Path, options: LoaderOptions) -> Result<ImageDataLoader> {
        if options.num_classes < 2 {
            return Err(CrowdError::Config(format!(
                "num_classes must be at least 2, got {}",
                options.num_classes
            )));
        }
        let pairs = pair_files(image_dir, gt_dir)?;

        // Counts come from the raw CSV mass; resizing preserves it.
        let mut counts = Vec::with_capacity(pairs.len());
        let mut densities = Vec::new();
        for (_, _, gt_path) in &pairs {
            let density = read_density_csv(gt_path)?;
            counts.push(density.sum());
            if options.pre_load {
                densities.push(density);
            }
        }

        let classes = CountClasses::from_counts(&counts, options.num_classes);
        let class_hist = classes.histogram(&counts);
        let class_weights = ClassWeights::from_histogram(&class_hist);

        let entries: Vec<Entry> = pairs
            .into_iter()
            .zip(&counts)
            .map(|((fname, image_path, gt_path), &count)| Entry {
                fname,
                image_path,
                gt_path,
                gt_class: classes.class_of(count),
            })
            .collect();

        let mut loader = ImageDataLoader {
            image_dir: image_dir.to_path_buf(),
            options,
            entries,
            blobs: None,
            classes,
            class_hist,
            class_weights,
        };

        tracing::debug!(
            histogram = ?loader.class_histogram(),
            bin = loader.count_classes().bin,
            "count classes"
        );

        if options.pre_load {
            tracing::info!(dir = ?image_dir, samples = loader.entries.len(), "pre-loading the data");
            let blobs = loader
                .entries
                .iter()
                .zip(densities)
                .map(|(entry, density)| loader.assemble(entry, density))
                .collect::<Result<Vec<_>>>()?;
            loader.blobs = Some(blobs);
        }

        Ok(loader)
    }

    pub fn num_samples(&self) -> usize {
        self.entries.len()
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Class loss weights over the full dataset, computed at construction.
    pub fn classifier_weights(&self) -> &ClassWeights {
        &self.class_weights
    }

    pub fn class_histogram(&self) -> &[usize] {
        &self.class_hist
    }

    pub fn count_classes(&self) -> &CountClasses {
        &self.classes
    }

    /// One pass over the dataset. With `shuffle` the order is a fresh
    /// permutation drawn from `rng`, otherwise file-name order.
    pub fn iter<R: Rng + ?Sized>(&self, rng: &mut R) -> Batches<'_> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        if self.options.shuffle {
            order.shuffle(rng);
        }
        Batches { loader: self, order, pos: 0 }
    }

    fn load(&self, idx: usize) -> Result<Blob> {
        if let Some(blobs) = &self.blobs {
            return Ok(blobs[idx].clone());
        }
        let entry = &self.entries[idx];
        let density = read_density_csv(&entry.gt_path)?;
        self.assemble(entry, density)
    }

    fn assemble(&self, entry: &Entry, density: Grid) -> Result<Blob> {
        let image = load_grayscale(&entry.image_path)?;
        let factor = self.options.downsample_factor();
        let gt_density = density.resize_preserving_sum(image.rows / factor, image.cols / factor);
        Ok(Blob {
            image,
            gt_density,
            gt_class: entry.gt_class,
            gt_class_label: one_hot(entry.gt_class, self.options.num_classes),
            fname: entry.fname.clone(),
        })
    }
}

/// Iterator over one epoch of a loader.
pub struct Batches<'a> {
    loader: &'a ImageDataLoader,
    order: Vec<usize>,
    pos: usize,
}

impl<'a> Batches<'a> {
    /// File names in the order this pass will yield them.
    pub fn file_order(&self) -> Vec<&'a str> {
        self.order.iter().map(|&i| self.loader.entries[i].fname.as_str()).collect()
    }
}

impl Iterator for Batches<'_> {
    type Item = Result<Blob>;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = *self.order.get(self.pos)?;
        self.pos += 1;
        Some(self.loader.load(idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.order.len() - self.pos;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Batches<'_> {}

/// Lists `(file name, image path, gt path)` triples, sorted by file name.
fn pair_files(image_dir: &Path, gt_dir: &Path) -> Result<Vec<(String, PathBuf, PathBuf)>> {
    let images = list_files(image_dir)?;
    let gt_stems: BTreeSet<String> = list_files(gt_dir)?
        .into_iter()
        .filter(|name| has_extension(name, "csv"))
        .map(|name| stem(&name))
        .collect();

    if images.is_empty() {
        return Err(CrowdError::EmptyDataset(image_dir.to_path_buf()));
    }

    let image_stems: BTreeSet<String> = images.iter().map(|n| stem(n)).collect();
    let report = MismatchReport {
        images_without_gt: images
            .iter()
            .filter(|n| !gt_stems.contains(&stem(n)))
            .cloned()
            .collect(),
        gt_without_images: gt_stems
            .iter()
            .filter(|s| !image_stems.contains(*s))
            .map(|s| format!("{}.csv", s))
            .collect(),
    };
    if !report.is_empty() {
        return Err(CrowdError::Mismatch {
            image_dir: image_dir.to_path_buf(),
            gt_dir: gt_dir.to_path_buf(),
            report,
        });
    }

    Ok(images
        .into_iter()
        .map(|name| {
            let gt_path = gt_dir.join(format!("{}.csv", stem(&name)));
            let image_path = image_dir.join(&name);
            (name, image_path, gt_path)
        })
        .collect())
}

/// Sorted names of regular, non-hidden files in `dir`.
fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| CrowdError::io(dir, e))? {
        let entry = entry.map_err(|e| CrowdError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| CrowdError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

fn stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}
