pub mod pipeline;
pub mod types;

pub use pipeline::{resolve, DiagnosisPipeline};
pub use types::{ClassProbability, Diagnosis, DiagnosisReport, Disease, Prediction};
