use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiagnosisError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Image conversion failed: {0}")]
    ImageConversion(String),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Request body exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// 单次前向推理失败，只影响当前请求
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct InferenceError(pub String);

impl InferenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ort::Error> for InferenceError {
    fn from(err: ort::Error) -> Self {
        Self(err.to_string())
    }
}

impl DiagnosisError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DiagnosisError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DiagnosisError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            DiagnosisError::ImageConversion(_) => StatusCode::BAD_REQUEST,
            DiagnosisError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            DiagnosisError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            DiagnosisError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DiagnosisError::Base64(_) => StatusCode::BAD_REQUEST,
            DiagnosisError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DiagnosisError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            DiagnosisError::ImageConversion(_) => "IMAGE_CONVERSION_ERROR",
            DiagnosisError::Inference(_) => "INFERENCE_ERROR",
            DiagnosisError::InvalidInput(_) => "INVALID_INPUT",
            DiagnosisError::FileTooLarge(_, _) | DiagnosisError::PayloadTooLarge(_) => {
                "FILE_TOO_LARGE"
            }
            DiagnosisError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            DiagnosisError::Config(_) => "CONFIG_ERROR",
            DiagnosisError::Base64(_) => "BASE64_DECODE_ERROR",
            DiagnosisError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            DiagnosisError::Ort(_) => "ORT_ERROR",
            DiagnosisError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否属于图像解码/转换类错误（请求级失败，不产生诊断结果）
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            DiagnosisError::ImageDecode(_)
                | DiagnosisError::ImageConversion(_)
                | DiagnosisError::UnsupportedFormat(_)
                | DiagnosisError::Base64(_)
        )
    }
}

impl IntoResponse for DiagnosisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
