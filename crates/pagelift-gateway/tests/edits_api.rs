use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, GenericImageView, GrayImage, RgbImage};
use pagelift_foundation::pipeline::codec::{decode_image, encode_png};
use pagelift_gateway::config::GatewayConfig;
use pagelift_kernel::{
    ExtractError, Extraction, ExtractorLoader, LoadConfig, LoadError, PageExtractor,
};
use pagelift_gateway::server::PageliftServer;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "pagelift-test-boundary";

enum Part<'a> {
    File(&'a str, Vec<u8>),
    Text(&'a str, &'a str),
    /// A part whose Content-Disposition carries no `name`.
    Unnamed(&'a str),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File(name, bytes) => {
                let disposition =
                    format!("form-data; name=\"{name}\"; filename=\"photo{i}.png\"");
                body.extend_from_slice(
                    format!("Content-Disposition: {disposition}\r\nContent-Type: image/png\r\n\r\n")
                        .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Unnamed(value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data\r\n\r\n{value}").as_bytes(),
                );
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn edit_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/images/edits")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Dark desk with a bright `page_w` x `page_h` page at (10, 10).
fn photo(width: u32, height: u32, page_w: u32, page_h: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        if (10..10 + page_w).contains(&x) && (10..10 + page_h).contains(&y) {
            image::Rgb([240, 236, 230])
        } else {
            image::Rgb([35, 30, 28])
        }
    });
    encode_png(&DynamicImage::ImageRgb8(img)).unwrap()
}

/// One 100x80 photo holding a 50x50 page.
fn page_request() -> Request<Body> {
    edit_request(&[Part::File("image", photo(100, 80, 50, 50))])
}

fn server(config: GatewayConfig) -> (PageliftServer, Router) {
    let server = PageliftServer::new(config);
    let app = server.build_app();
    (server, app)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request success");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn decoded_dims(entry: &Value) -> (u32, u32) {
    let b64 = entry["b64_json"].as_str().expect("b64_json string");
    let bytes = STANDARD.decode(b64).expect("valid base64");
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    decode_image(&bytes).unwrap().dimensions()
}

#[tokio::test]
async fn single_image_is_cropped_to_the_page() {
    let (server, app) = server(GatewayConfig::default());

    let (status, body) = send(&app, page_request()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["created"].as_i64().unwrap() > 0);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(decoded_dims(&data[0]), (50, 50));
    assert_eq!(server.gate().stats().loads, 1);
}

#[tokio::test]
async fn multiple_images_keep_upload_order() {
    let (_server, app) = server(GatewayConfig::default());

    let (status, body) = send(
        &app,
        edit_request(&[
            Part::File("image", photo(100, 80, 30, 40)),
            Part::File("image", photo(120, 90, 60, 40)),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(decoded_dims(&data[0]), (30, 40));
    assert_eq!(decoded_dims(&data[1]), (60, 40));
}

#[tokio::test]
async fn array_style_field_name_and_extra_fields_are_accepted() {
    let (_server, app) = server(GatewayConfig::default());

    let (status, body) = send(
        &app,
        edit_request(&[
            Part::Text("model", "gpt-image-1"),
            Part::File("image[]", photo(100, 80, 50, 50)),
            Part::File("image[]", photo(100, 80, 40, 30)),
            Part::Text("prompt", "the page"),
            Part::Text("response_format", "b64_json"),
            Part::Text("n", "1"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(decoded_dims(&data[1]), (40, 30));
}

#[tokio::test]
async fn unnamed_parts_are_ignored() {
    let (_server, app) = server(GatewayConfig::default());

    let (status, body) = send(
        &app,
        edit_request(&[
            Part::Unnamed("stray"),
            Part::File("image", photo(100, 80, 50, 50)),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn plain_image_parts_win_over_array_parts() {
    let (_server, app) = server(GatewayConfig::default());

    let (status, body) = send(
        &app,
        edit_request(&[
            Part::File("image[]", photo(100, 80, 40, 30)),
            Part::File("image", photo(100, 80, 50, 50)),
            Part::File("image[]", photo(100, 80, 30, 40)),
            Part::File("image", photo(120, 90, 60, 40)),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(decoded_dims(&data[0]), (50, 50));
    assert_eq!(decoded_dims(&data[1]), (60, 40));
}

/// Returns the image unchanged and remembers each prompt.
#[derive(Default)]
struct RecordingExtractor {
    prompts: Mutex<Vec<String>>,
}

impl PageExtractor for RecordingExtractor {
    fn variant(&self) -> &str {
        "recording"
    }

    fn extract_page(&self, image: &DynamicImage, prompt: &str) -> Result<Extraction, ExtractError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Extraction {
            mask: GrayImage::new(image.width(), image.height()),
            score: 1.0,
            cropped: image.clone(),
        })
    }
}

struct RecordingLoader(Arc<RecordingExtractor>);

#[async_trait]
impl ExtractorLoader for RecordingLoader {
    async fn load(&self, _config: &LoadConfig) -> Result<Arc<dyn PageExtractor>, LoadError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn prompt_field_and_configured_default_reach_the_extractor() {
    let extractor = Arc::new(RecordingExtractor::default());
    let config = GatewayConfig {
        default_prompt: "receipt.".to_string(),
        ..GatewayConfig::default()
    };
    let server = PageliftServer::with_loader(config, Arc::new(RecordingLoader(extractor.clone())));
    let app = server.build_app();

    let (status, _) = send(&app, page_request()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        edit_request(&[
            Part::File("image", photo(100, 80, 50, 50)),
            Part::Text("prompt", "doc."),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(*extractor.prompts.lock().unwrap(), vec!["receipt.", "doc."]);
}

#[tokio::test]
async fn unsupported_response_format_is_rejected_without_loading() {
    let (server, app) = server(GatewayConfig::default());

    let (status, body) = send(
        &app,
        edit_request(&[
            Part::File("image", photo(100, 80, 50, 50)),
            Part::Text("response_format", "url"),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("Invalid response_format"));
    assert_eq!(server.gate().stats().loads, 0);
}

#[tokio::test]
async fn missing_image_is_rejected() {
    let (server, app) = server(GatewayConfig::default());

    let (status, body) = send(&app, edit_request(&[Part::Text("prompt", "page.")])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No image provided");
    assert_eq!(server.gate().stats().loads, 0);
}

#[tokio::test]
async fn undecodable_image_is_rejected() {
    let (server, app) = server(GatewayConfig::default());

    let (status, body) = send(
        &app,
        edit_request(&[Part::File("image", b"definitely not a png".to_vec())]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("Invalid image file"));
    assert_eq!(server.gate().stats().loads, 0);
}

#[tokio::test]
async fn non_multipart_body_is_rejected() {
    let (_server, app) = server(GatewayConfig::default());

    let request = Request::builder()
        .method("POST")
        .uri("/v1/images/edits")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"image":"abc"}"#))
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let config = GatewayConfig {
        max_upload_bytes: 1024,
        ..GatewayConfig::default()
    };
    let (server, app) = server(config);

    let noisy = RgbImage::from_fn(200, 200, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
    });
    let bytes = encode_png(&DynamicImage::ImageRgb8(noisy)).unwrap();
    assert!(bytes.len() > 1024);

    let (status, _) = send(&app, edit_request(&[Part::File("image", bytes)])).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(server.gate().stats().loads, 0);
}

#[tokio::test]
async fn load_failure_is_503_without_backend_detail() {
    let mut config = GatewayConfig::default();
    config.model.device = "cuda".into();
    let (server, app) = server(config);

    let (status, body) = send(&app, page_request()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let detail = body["detail"].as_str().unwrap();
    assert_eq!(detail, "Model unavailable");
    assert!(!detail.contains("cuda"));

    // The failed load is not cached; the next request tries again.
    let (status, _) = send(&app, page_request()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(server.gate().stats().loads, 2);
}

#[tokio::test]
async fn concurrent_requests_share_one_load() {
    let (server, app) = server(GatewayConfig::default());

    let requests = (0..6).map(|_| {
        let app = app.clone();
        async move { send(&app, page_request()).await }
    });
    let results = futures::future::join_all(requests).await;

    for (status, body) in results {
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decoded_dims(&body["data"][0]), (50, 50));
    }
    assert_eq!(server.gate().stats().loads, 1);
}

#[tokio::test]
async fn health_reports_model_state() {
    let (_server, app) = server(GatewayConfig::default());
    let health = || {
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&app, health()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"]["state"], "absent");
    assert_eq!(body["model"]["variant"], "otsu");
    assert_eq!(body["model"]["device"], "cpu");
    assert!(body["model"]["idle_secs"].is_null());

    let (status, _) = send(&app, page_request()).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, health()).await;
    assert_eq!(body["model"]["state"], "loaded");
    assert_eq!(body["model"]["loads"], 1);
    assert_eq!(body["model"]["in_flight"], 0);
}
