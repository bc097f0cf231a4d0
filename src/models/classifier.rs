use crate::diagnosis::Prediction;
use crate::image::NormalizedTensor;
use crate::utils::error::{DiagnosisError, InferenceError};
use crate::{Config, Result};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;

/// 叶片分类模型：tensor[1,128,128,3] -> 概率向量[3]
pub trait LeafClassifier: Send + Sync {
    /// 单次同步前向推理
    fn forward(&self, input: &NormalizedTensor) -> std::result::Result<Prediction, InferenceError>;

    /// 模型声明的输出宽度；动态维度返回 None
    fn output_width(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str;
}

pub struct OnnxClassifier {
    // Session::run 需要 &mut self
    session: Mutex<Session>,
    input_name: String,
    output_name: String, // 动态发现的输出名称
    output_width: Option<usize>,
    name: String,
}

impl OnnxClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = &config.model_path;

        if !model_path.exists() {
            return Err(DiagnosisError::ModelLoad(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(optimization_level(config.onnx_config.optimization_level))?
            .with_intra_threads(config.onnx_config.intra_threads)?
            .commit_from_file(model_path)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| DiagnosisError::ModelLoad("Classification model has no inputs".to_string()))?;

        let output = session
            .outputs
            .first()
            .ok_or_else(|| DiagnosisError::ModelLoad("Classification model has no outputs".to_string()))?;
        let output_name = output.name.clone();

        // 最后一维即类别数；-1 表示动态维度
        let output_width = output
            .output_type
            .tensor_shape()
            .and_then(|shape| shape.last().copied())
            .filter(|&width| width > 0)
            .map(|width| width as usize);

        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }
        tracing::info!(
            "Classification model input: '{}', output: '{}' (width {:?})",
            input_name,
            output_name,
            output_width
        );

        let name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            output_width,
            name,
        })
    }
}

impl LeafClassifier for OnnxClassifier {
    fn forward(&self, input: &NormalizedTensor) -> std::result::Result<Prediction, InferenceError> {
        let input_tensor = Tensor::from_array(input.clone().into_array())?;

        let values: Vec<f32> = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output.try_extract_array::<f32>()?.iter().copied().collect(),
                None => {
                    let available_outputs: Vec<String> =
                        outputs.keys().map(|s| s.to_string()).collect();
                    return Err(InferenceError::new(format!(
                        "Classification output '{}' not found. Available outputs: {:?}",
                        self.output_name, available_outputs
                    )));
                }
            }
        };

        Prediction::new(&values)
    }

    fn output_width(&self) -> Option<usize> {
        self.output_width
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        i32::MIN..=0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}
