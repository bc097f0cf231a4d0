pub mod loader;
pub mod normalizer;

pub use loader::ImageLoader;
pub use normalizer::{ImageNormalizer, NormalizedTensor};
