use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use base64::Engine;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use leaf_diagnosis::config::{Config, PixelScale, ServerConfig};
use leaf_diagnosis::diagnosis::Prediction;
use leaf_diagnosis::image::NormalizedTensor;
use leaf_diagnosis::models::{LeafClassifier, ModelService};
use leaf_diagnosis::web::create_app;
use leaf_diagnosis::InferenceError;
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "leaf-test-boundary";

struct StubClassifier(Result<[f32; 3], String>);

impl LeafClassifier for StubClassifier {
    fn forward(&self, _input: &NormalizedTensor) -> Result<Prediction, InferenceError> {
        match &self.0 {
            Ok(values) => Prediction::new(values),
            Err(message) => Err(InferenceError::new(message.clone())),
        }
    }

    fn output_width(&self) -> Option<usize> {
        Some(3)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn app(result: Result<[f32; 3], String>) -> Router {
    app_with(Config::default(), result)
}

fn app_with(config: Config, result: Result<[f32; 3], String>) -> Router {
    let service =
        ModelService::with_classifier(Arc::new(StubClassifier(result)), PixelScale::Raw).unwrap();
    create_app(config, Arc::new(service))
}

fn leaf_png() -> Vec<u8> {
    let img = ImageBuffer::from_pixel(40, 30, Rgb([50u8, 180, 60]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// 随机噪声几乎无法压缩，PNG体积约等于原始像素数据（约3MB）
fn large_leaf_png() -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    let img = ImageBuffer::from_fn(1100, 1000, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn multipart_body(content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"leaf.png\"\r\n",
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(content_type: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(content_type, data)))
        .unwrap()
}

fn json_request(image: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Request-ID", "req-42")
        .body(Body::from(serde_json::json!({ "image": image }).to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn upload_returns_diagnosis() {
    let (status, body) = send(
        app(Ok([0.9, 0.05, 0.05])),
        upload_request("image/png", &leaf_png()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["diagnosis"]["label"], "Healthy");
    assert_eq!(
        body["data"]["diagnosis"]["display"],
        "Healthy (90.00% Confidence)"
    );
    let confidence = body["data"]["diagnosis"]["confidence"].as_f64().unwrap();
    assert!((confidence - 90.0).abs() < 1e-3);
    assert_eq!(body["data"]["probabilities"][2]["label"], "Late Blight");
}

#[tokio::test]
async fn camera_capture_data_url_is_accepted() {
    let encoded = base64::engine::general_purpose::STANDARD.encode(leaf_png());
    let data_url = format!("data:image/png;base64,{}", encoded);

    let (status, body) = send(app(Ok([0.1, 0.1, 0.8])), json_request(&data_url)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["diagnosis"]["label"], "Late Blight");
    assert_eq!(body["request_id"], "req-42");
}

#[tokio::test]
async fn large_photo_within_limit_is_accepted() {
    let png = large_leaf_png();
    assert!(png.len() > 2 * 1024 * 1024);

    let (status, body) = send(
        app(Ok([0.1, 0.8, 0.1])),
        upload_request("image/png", &png),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["diagnosis"]["label"], "Early Blight");

    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
    let data_url = format!("data:image/png;base64,{}", encoded);
    let (status, body) = send(app(Ok([0.1, 0.8, 0.1])), json_request(&data_url)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["diagnosis"]["label"], "Early Blight");
}

#[tokio::test]
async fn body_over_limit_is_payload_too_large() {
    let config = Config {
        server_config: ServerConfig {
            request_timeout: 60,
            max_request_size: 64 * 1024,
        },
        ..Config::default()
    };
    let png = large_leaf_png();

    let (status, body) = send(
        app_with(config.clone(), Ok([0.9, 0.05, 0.05])),
        upload_request("image/png", &png),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "FILE_TOO_LARGE");

    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
    let (status, body) = send(
        app_with(config, Ok([0.9, 0.05, 0.05])),
        json_request(&format!("data:image/png;base64,{}", encoded)),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "FILE_TOO_LARGE");
}

#[tokio::test]
async fn corrupted_upload_is_bad_request() {
    let (status, body) = send(
        app(Ok([0.9, 0.05, 0.05])),
        upload_request("image/png", b"\x89PNG\r\n\x1a\n broken"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "IMAGE_DECODE_ERROR");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn non_image_upload_is_unsupported() {
    let (status, body) = send(
        app(Ok([0.9, 0.05, 0.05])),
        upload_request("text/plain", b"hello"),
    )
    .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn empty_json_image_fails_validation() {
    let (status, body) = send(app(Ok([0.9, 0.05, 0.05])), json_request("")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn model_failure_returns_error_label() {
    let (status, body) = send(
        app(Err("runtime lost its session".to_string())),
        upload_request("image/png", &leaf_png()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["diagnosis"]["label"], "Error");
    assert_eq!(body["data"]["diagnosis"]["confidence"].as_f64(), Some(0.0));
    assert_eq!(body["error"]["code"], "INFERENCE_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("runtime lost its session"));
}

#[tokio::test]
async fn health_and_info() {
    let (status, body) = send(
        app(Ok([0.9, 0.05, 0.05])),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(
        app(Ok([0.9, 0.05, 0.05])),
        Request::builder().uri("/api/info").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["model"]["labels"],
        serde_json::json!(["Healthy", "Early Blight", "Late Blight"])
    );
    assert_eq!(body["model"]["input_shape"], serde_json::json!([1, 128, 128, 3]));
}

#[tokio::test]
async fn health_reports_broken_model() {
    let (status, body) = send(
        app(Err("no session".to_string())),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INFERENCE_ERROR");
}

#[tokio::test]
async fn index_serves_ui() {
    let response = app(Ok([0.9, 0.05, 0.05]))
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::X_CONTENT_TYPE_OPTIONS],
        "nosniff"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Predict Disease"));
}
