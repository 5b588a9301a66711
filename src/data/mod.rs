pub mod augment;
pub mod blob;
pub mod csv;
pub mod image;
pub mod labels;
pub mod loader;

pub use augment::{augment, AugmentConfig};
pub use blob::Blob;
pub use labels::{ClassWeights, CountClasses};
pub use loader::{ImageDataLoader, LoaderOptions};
