use crate::config::PixelScale;
use crate::diagnosis::Disease;
use crate::image::{ImageNormalizer, NormalizedTensor};
use crate::models::{LeafClassifier, OnnxClassifier};
use crate::utils::error::DiagnosisError;
use crate::{Config, Result};
use serde::Serialize;
use std::sync::Arc;

/// 进程启动时构建一次、之后只读共享的模型服务
pub struct ModelService {
    classifier: Arc<dyn LeafClassifier>,
    normalizer: ImageNormalizer,
    pixel_scale: PixelScale,
    intra_threads: usize,
}

impl ModelService {
    /// 从配置加载ONNX模型
    pub fn load(config: &Config) -> Result<Self> {
        tracing::info!("Initializing model service...");

        let classifier = OnnxClassifier::new(config)?;
        let service = Self::with_classifier(Arc::new(classifier), config.pixel_scale)?
            .with_intra_threads(config.onnx_config.intra_threads);

        tracing::info!("Model service initialized successfully");
        Ok(service)
    }

    /// 使用任意分类器构建服务，并校验输出宽度与类别数一致
    pub fn with_classifier(
        classifier: Arc<dyn LeafClassifier>,
        pixel_scale: PixelScale,
    ) -> Result<Self> {
        if let Some(width) = classifier.output_width() {
            if width != Disease::COUNT {
                return Err(DiagnosisError::ModelLoad(format!(
                    "Model '{}' outputs {} classes, expected {} ({})",
                    classifier.name(),
                    width,
                    Disease::COUNT,
                    Disease::ALL.map(|d| d.label()).join(", ")
                )));
            }
        } else {
            tracing::warn!(
                "Model '{}' has a dynamic output width; it will be checked per prediction",
                classifier.name()
            );
        }

        Ok(Self {
            classifier,
            normalizer: ImageNormalizer::new(pixel_scale),
            pixel_scale,
            intra_threads: 1,
        })
    }

    fn with_intra_threads(mut self, intra_threads: usize) -> Self {
        self.intra_threads = intra_threads;
        self
    }

    /// 获取分类器引用
    pub fn classifier(&self) -> &dyn LeafClassifier {
        self.classifier.as_ref()
    }

    pub fn normalizer(&self) -> &ImageNormalizer {
        &self.normalizer
    }

    /// 模型健康检查：对全零输入做一次推理
    pub fn health_check(&self) -> Result<()> {
        tracing::debug!("Performing model health check...");

        let blank = NormalizedTensor::from_array(ndarray::Array4::zeros(NormalizedTensor::SHAPE))?;
        self.classifier.forward(&blank)?;

        tracing::debug!("Model health check passed");
        Ok(())
    }

    /// 获取模型统计信息
    pub fn stats(&self) -> ModelStats {
        ModelStats {
            model_name: self.classifier.name().to_string(),
            labels: Disease::ALL.to_vec(),
            input_shape: NormalizedTensor::SHAPE.to_vec(),
            pixel_scale: self.pixel_scale,
            intra_threads: self.intra_threads,
        }
    }
}

/// 模型统计信息
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub model_name: String,
    pub labels: Vec<Disease>,
    pub input_shape: Vec<usize>,
    pub pixel_scale: PixelScale,
    pub intra_threads: usize,
}
