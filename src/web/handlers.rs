use crate::{
    diagnosis::DiagnosisReport,
    utils::error::DiagnosisError,
    web::{
        extractors::{RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// JSON请求体（base64 / data URL，摄像头拍照使用）
#[derive(Debug, Deserialize)]
pub struct PredictJsonRequest {
    /// Base64编码的图像数据
    pub image: String,
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

impl ApiResponse<DiagnosisReport> {
    /// 推理失败时仍返回降级结果，并附带错误信息
    pub fn from_report(report: DiagnosisReport, request_id: String) -> Self {
        match report.error.clone() {
            None => Self::success(report, request_id),
            Some(message) => Self {
                success: false,
                data: Some(report),
                error: Some(ApiError {
                    code: "INFERENCE_ERROR".to_string(),
                    message,
                }),
                timestamp: chrono::Utc::now().to_rfc3339(),
                request_id,
            },
        }
    }
}

/// JSON base64上传处理器
pub async fn predict_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<PredictJsonRequest>,
) -> Result<Json<ApiResponse<DiagnosisReport>>> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing JSON predict request: request_id={}, payload={} chars",
        request_id,
        request.image.len()
    );

    let pipeline = state.pipeline.clone();
    let max_bytes = state.config.max_image_bytes();
    let report = tokio::task::spawn_blocking(move || {
        pipeline.process_base64(&request.image, max_bytes)
    })
    .await
    .map_err(|e| DiagnosisError::Internal(format!("Prediction task failed: {}", e)))??;

    tracing::info!(
        "JSON predict completed: request_id={}, label={}, time={:.3}s",
        request_id,
        report.diagnosis.label,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::from_report(report, request_id)))
}

/// Multipart文件上传处理器
pub async fn predict_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<DiagnosisReport>>> {
    let start_time = Instant::now();

    tracing::info!("Processing multipart predict request: request_id={}", request_id);

    let mut image_data: Option<Bytes> = None;
    let body_limit = state.config.server_config.max_request_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, body_limit, "Failed to read multipart field"))?
    {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                // 验证内容类型
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return Err(DiagnosisError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, body_limit, "Failed to read file data"))?;

                if data.is_empty() {
                    return Err(DiagnosisError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data = image_data
        .ok_or_else(|| DiagnosisError::InvalidInput("No image file provided".to_string()))?;

    let pipeline = state.pipeline.clone();
    let max_bytes = state.config.max_image_bytes();
    let report = tokio::task::spawn_blocking(move || pipeline.process_bytes(&image_data, max_bytes))
        .await
        .map_err(|e| DiagnosisError::Internal(format!("Prediction task failed: {}", e)))??;

    tracing::info!(
        "Upload predict completed: request_id={}, label={}, time={:.3}s",
        request_id,
        report.diagnosis.label,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::from_report(report, request_id)))
}

/// 超出请求体上限的读取错误映射为413，其余为400
fn multipart_error(err: MultipartError, body_limit: usize, context: &str) -> DiagnosisError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DiagnosisError::PayloadTooLarge(body_limit)
    } else {
        DiagnosisError::InvalidInput(format!("{}: {}", context, err.body_text()))
    }
}
