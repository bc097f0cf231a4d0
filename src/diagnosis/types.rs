use crate::utils::error::InferenceError;
use serde::{Serialize, Serializer};
use std::fmt;

/// 模型输出的类别。变体顺序即模型输出向量的下标顺序，重新训练模型之前不得调整。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disease {
    Healthy,
    EarlyBlight,
    LateBlight,
}

impl Disease {
    pub const COUNT: usize = 3;

    pub const ALL: [Disease; Disease::COUNT] =
        [Disease::Healthy, Disease::EarlyBlight, Disease::LateBlight];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Disease::Healthy => "Healthy",
            Disease::EarlyBlight => "Early Blight",
            Disease::LateBlight => "Late Blight",
        }
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Disease {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// 一次前向推理得到的概率向量，按 [`Disease::ALL`] 顺序排列
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    probabilities: [f32; Disease::COUNT],
}

impl Prediction {
    pub fn new(values: &[f32]) -> Result<Self, InferenceError> {
        let probabilities: [f32; Disease::COUNT] = values.try_into().map_err(|_| {
            InferenceError::new(format!(
                "Model produced {} outputs, expected {}",
                values.len(),
                Disease::COUNT
            ))
        })?;

        if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
            return Err(InferenceError::new(format!(
                "Model produced a non-finite probability: {}",
                bad
            )));
        }

        Ok(Self { probabilities })
    }

    pub fn probabilities(&self) -> &[f32; Disease::COUNT] {
        &self.probabilities
    }

    pub fn probability(&self, disease: Disease) -> f32 {
        self.probabilities[disease.index()]
    }

    /// 最大值下标，并列时取第一个
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, &p) in self.probabilities.iter().enumerate().skip(1) {
            if p > self.probabilities[best] {
                best = i;
            }
        }
        best
    }
}

/// 面向用户的诊断结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    /// 类别名称；推理失败时为 "Error"
    pub label: String,
    /// 置信度百分比 [0, 100]
    pub confidence: f32,
    /// 展示文本，例如 "Healthy (90.00% Confidence)"
    pub display: String,
}

impl Diagnosis {
    pub const ERROR_LABEL: &'static str = "Error";

    pub fn new(disease: Disease, confidence: f32) -> Self {
        Self {
            label: disease.label().to_string(),
            confidence,
            display: format!("{} ({:.2}% Confidence)", disease.label(), confidence),
        }
    }

    /// 推理失败时的降级结果
    pub fn error() -> Self {
        Self {
            label: Self::ERROR_LABEL.to_string(),
            confidence: 0.0,
            display: Self::ERROR_LABEL.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.label == Self::ERROR_LABEL
    }

    pub fn disease(&self) -> Option<Disease> {
        Disease::ALL.into_iter().find(|d| d.label() == self.label)
    }
}

/// 单个类别的原始概率
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbability {
    pub label: Disease,
    pub probability: f32,
}

/// 一次请求的完整输出
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    pub diagnosis: Diagnosis,
    /// 模型原始输出（推理失败时为空）
    pub probabilities: Vec<ClassProbability>,
    pub input_shape: Vec<usize>,
    /// 处理耗时（秒）
    pub processing_time: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiagnosisReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
