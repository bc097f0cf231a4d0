pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod ui;

use crate::{diagnosis::DiagnosisPipeline, models::ModelService, Config, Result};
use crate::utils::error::DiagnosisError;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: DiagnosisPipeline,
}

pub async fn serve(config: Config) -> Result<()> {
    // 模型只在启动时加载一次
    let service = Arc::new(ModelService::load(&config)?);

    let app = create_app(config.clone(), service);
    let addr = config.socket_addr()?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /predict        - JSON base64 / camera capture");
    tracing::info!("  POST /predict/upload - Multipart file upload");
    tracing::info!("  GET  /               - Web UI");
    tracing::info!("  GET  /health         - Health check");
    tracing::info!("  GET  /api/info       - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        DiagnosisError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| DiagnosisError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(config: Config, service: Arc<ModelService>) -> Router {
    let state = AppState {
        pipeline: DiagnosisPipeline::new(service),
        config: config.clone(),
    };

    Router::new()
        .route("/predict", post(handlers::predict_json_handler))
        .route("/predict/upload", post(handlers::predict_upload_handler))
        .route("/", get(ui::index_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        // 提取器默认只允许2MB，需与整体请求体上限保持一致
        .layer(DefaultBodyLimit::max(config.server_config.max_request_size))
        .layer(RequestBodyLimitLayer::new(config.server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server_config.request_timeout)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let pipeline = state.pipeline.clone();
    tokio::task::spawn_blocking(move || pipeline.service().health_check())
        .await
        .map_err(|e| DiagnosisError::Internal(format!("Health check task failed: {}", e)))??;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.pipeline.service().stats();

    Json(json!({
        "service": "Leaf Diagnosis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": stats,
        "features": {
            "upload": true,
            "camera_capture": true,
            "accepted_formats": ["image/jpeg", "image/png"],
            "confidence_threshold": null
        }
    }))
}
