pub mod classifier;
pub mod manager;

pub use classifier::{LeafClassifier, OnnxClassifier};
pub use manager::{ModelService, ModelStats};
