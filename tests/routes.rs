//! HTTP surface tests

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use image::{DynamicImage, GrayImage, Luma};
use serde_json::Value;
use tower::ServiceExt;

use ocr_arbiter::config::Config;
use ocr_arbiter::ocr::{
    BoundingBox, ClassicalAdapter, EngineAdapter, EngineError, EngineRegistry, TextRegion, TokenEngine,
};
use ocr_arbiter::pdf::PdfStrategyConfig;
use ocr_arbiter::routes;
use ocr_arbiter::state::AppState;

const BOUNDARY: &str = "ocr-arbiter-test-boundary";

struct Words;

impl TokenEngine for Words {
    fn recognize_tokens(&mut self, _image: &DynamicImage) -> Result<Vec<TextRegion>, EngineError> {
        Ok(vec![TextRegion {
            text: "Hello".to_string(),
            confidence: 0.9,
            bounding_box: BoundingBox::new(0.0, 0.0, 5.0, 5.0),
        }])
    }
}

fn app(scratch: &std::path::Path) -> axum::Router {
    let config = Config {
        pdf: PdfStrategyConfig {
            scratch_dir: scratch.to_path_buf(),
            ..PdfStrategyConfig::default()
        },
        ..Config::default()
    };
    let registry = EngineRegistry::new(vec![
        Arc::new(ClassicalAdapter::with_engine("tesseract", 0.3, Words)) as Arc<dyn EngineAdapter>
    ]);
    routes::app(AppState::new(config, registry))
}

fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/v1/extract")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn png() -> Vec<u8> {
    let mut png = Vec::new();
    DynamicImage::ImageLuma8(GrayImage::from_pixel(48, 24, Luma([240])))
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    png
}

#[tokio::test]
async fn health_reports_version() {
    let scratch = tempfile::tempdir().unwrap();
    let response = app(scratch.path())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn extract_image_upload() {
    let scratch = tempfile::tempdir().unwrap();
    let response = app(scratch.path())
        .oneshot(multipart(&[("file", Some("scan.png"), &png())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["filename"], "scan.png");
    assert_eq!(json["result"]["text"], "Hello");
    assert_eq!(json["result"]["bestEngine"], "tesseract");
    assert!(json["requestId"].as_str().is_some());
    assert!(json["timestamp"].as_str().is_some());
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn extract_unsupported_upload() {
    let scratch = tempfile::tempdir().unwrap();
    let response = app(scratch.path())
        .oneshot(multipart(&[("file", Some("notes.txt"), b"just some notes")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["result"]["status"], "unsupported-type");
    assert_eq!(json["result"]["confidence"], 0.0);
    assert_eq!(json["result"]["error"], "Unsupported file type: .txt");
}

#[tokio::test]
async fn extract_without_file_is_bad_request() {
    let scratch = tempfile::tempdir().unwrap();
    let response = app(scratch.path())
        .oneshot(multipart(&[("comment", None, b"no upload here")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn ocr_status_lists_engines() {
    let scratch = tempfile::tempdir().unwrap();
    let response = app(scratch.path())
        .oneshot(Request::builder().uri("/api/v1/ocr/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["engines"][0]["id"], "tesseract");
    assert_eq!(json["engines"][0]["available"], true);
    assert_eq!(json["serviceReady"], true);
    assert_eq!(json["multiEngineSupport"], false);
    assert_eq!(json["preprocessingEnabled"], true);
    assert!(json["supportedFormats"].as_array().unwrap().iter().any(|f| f == ".tif"));
}
