use std::fmt;
use std::path::PathBuf;

/// Files that could not be paired between an image directory and its
/// ground-truth directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MismatchReport {
    /// Images with no `<stem>.csv` in the ground-truth directory.
    pub images_without_gt: Vec<String>,
    /// Ground-truth CSV files with no image of the same stem.
    pub gt_without_images: Vec<String>,
}

impl MismatchReport {
    pub fn is_empty(&self) -> bool {
        self.images_without_gt.is_empty() && self.gt_without_images.is_empty()
    }
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} image(s) without ground truth {:?}, {} ground-truth file(s) without image {:?}",
            self.images_without_gt.len(),
            self.images_without_gt,
            self.gt_without_images.len(),
            self.gt_without_images,
        )
    }
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
pub enum CrowdError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{path:?} row {row}: {message}")]
    Csv {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("image/ground-truth mismatch between {image_dir:?} and {gt_dir:?}: {report}")]
    Mismatch {
        image_dir: PathBuf,
        gt_dir: PathBuf,
        report: MismatchReport,
    },

    #[error("no samples found in {0:?}")]
    EmptyDataset(PathBuf),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("non-finite or negative loss {loss} at epoch {epoch}, step {step}")]
    InvalidLoss { epoch: usize, step: usize, loss: f64 },

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("backward called before forward")]
    NoForwardPass,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrowdError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrowdError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, CrowdError>;
