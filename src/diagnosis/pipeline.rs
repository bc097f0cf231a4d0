use crate::{
    diagnosis::{ClassProbability, Diagnosis, DiagnosisReport, Disease, Prediction},
    image::{ImageLoader, NormalizedTensor},
    models::ModelService,
    utils::error::InferenceError,
    Result,
};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;

/// 由概率向量得到诊断结果：argmax -> 类别，概率 * 100 -> 置信度
pub fn resolve(prediction: &Prediction) -> Diagnosis {
    let index = prediction.argmax();
    // argmax 总小于 Disease::COUNT
    let disease = Disease::from_index(index).unwrap_or(Disease::Healthy);
    let confidence = prediction.probabilities()[index] * 100.0;

    Diagnosis::new(disease, confidence)
}

/// normalize -> infer -> resolve 流水线
#[derive(Clone)]
pub struct DiagnosisPipeline {
    service: Arc<ModelService>,
}

impl DiagnosisPipeline {
    pub fn new(service: Arc<ModelService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &ModelService {
        &self.service
    }

    /// 处理base64图像
    pub fn process_base64(&self, base64_data: &str, max_bytes: usize) -> Result<DiagnosisReport> {
        let start_time = Instant::now();
        let image = ImageLoader::from_base64(base64_data, max_bytes)?;
        self.process_image(&image, start_time)
    }

    /// 处理上传的字节流
    pub fn process_bytes(&self, bytes: &[u8], max_bytes: usize) -> Result<DiagnosisReport> {
        let start_time = Instant::now();
        let image = ImageLoader::from_bytes(bytes, max_bytes)?;
        self.process_image(&image, start_time)
    }

    /// 诊断一张已解码的图像
    pub fn diagnose(&self, image: &DynamicImage) -> Result<DiagnosisReport> {
        self.process_image(image, Instant::now())
    }

    /// 单次前向推理
    pub fn infer(&self, tensor: &NormalizedTensor) -> std::result::Result<Prediction, InferenceError> {
        self.service.classifier().forward(tensor)
    }

    fn process_image(&self, image: &DynamicImage, start_time: Instant) -> Result<DiagnosisReport> {
        // 解码/转换失败直接返回错误，不产生结果
        let tensor = self.service.normalizer().normalize(image)?;
        let input_shape = tensor.shape().to_vec();

        tracing::debug!("Image shape before prediction: {:?}", input_shape);

        let report = match self.infer(&tensor) {
            Ok(prediction) => {
                tracing::debug!("Model raw output: {:?}", prediction.probabilities());

                let diagnosis = resolve(&prediction);
                let probabilities = Disease::ALL
                    .iter()
                    .map(|&label| ClassProbability {
                        label,
                        probability: prediction.probability(label),
                    })
                    .collect();

                DiagnosisReport {
                    diagnosis,
                    probabilities,
                    input_shape,
                    processing_time: start_time.elapsed().as_secs_f32(),
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!("Error in prediction: {}", e);

                DiagnosisReport {
                    diagnosis: Diagnosis::error(),
                    probabilities: Vec::new(),
                    input_shape,
                    processing_time: start_time.elapsed().as_secs_f32(),
                    error: Some(format!("Error in prediction: {}", e)),
                }
            }
        };

        tracing::info!(
            "Diagnosis completed: label={}, confidence={:.2}%, time={:.3}s",
            report.diagnosis.label,
            report.diagnosis.confidence,
            report.processing_time
        );

        Ok(report)
    }
}
