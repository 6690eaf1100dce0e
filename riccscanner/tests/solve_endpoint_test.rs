use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageBuffer, Rgb};
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use riccscanner::api::{create_router, AppState};
use riccscanner::config::{Config, OcrConfig};
use riccscanner::ocr::OcrProvider;

fn vision_config(base_url: String) -> OcrConfig {
    OcrConfig {
        model: "openai/gpt-4o".to_string(),
        api_key: Some("test-key".to_string()),
        base_url: Some(base_url),
        timeout_secs: 5,
        max_retries: 1,
        ..OcrConfig::default()
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ]
    })
}

fn photo_base64() -> String {
    encoded_photo(image::ImageFormat::Png)
}

fn encoded_photo(format: image::ImageFormat) -> String {
    let img = ImageBuffer::from_fn(160, 90, |x, _| {
        if x % 20 < 3 {
            Rgb([20u8, 20, 20])
        } else {
            Rgb([240u8, 240, 240])
        }
    });
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), format)
        .unwrap();
    STANDARD.encode(bytes)
}

fn router(ocr_config: OcrConfig) -> Router {
    let config = Config {
        ocr: ocr_config,
        ..Config::default()
    };
    let ocr = OcrProvider::new(&config.ocr).unwrap();
    create_router(AppState::new(config, ocr))
}

async fn post_solve(app: Router, image: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/solve")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "image": image }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, body["result"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn solves_expression_read_by_vision_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("2 + 3 × 4")))
        .expect(1)
        .mount(&server)
        .await;

    let (status, result) = post_solve(router(vision_config(server.uri())), &photo_base64()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        result,
        "Detected: 2+3*4\n\nExpression: 2+3*4\nSimplified: 14\nResult: 14.0"
    );
}

#[tokio::test]
async fn solves_equation_from_data_url_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("y² - 4 = 0")))
        .mount(&server)
        .await;

    let upload = format!("data:image/png;base64,{}", photo_base64());
    let (status, result) = post_solve(router(vision_config(server.uri())), &upload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        result,
        "Detected: y**2-4=0\n\nEquation: y**2-4 = 0\nSolution: [-2, 2]"
    );
}

#[tokio::test]
async fn blank_ocr_output_returns_tips() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("  ")))
        .mount(&server)
        .await;

    let config = OcrConfig {
        preprocess: false,
        ..vision_config(server.uri())
    };
    let (status, result) = post_solve(router(config), &photo_base64()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(result.starts_with("No math expression detected."), "{result}");
    assert!(result.contains("- Write clearly with dark ink"));
}

#[tokio::test]
async fn unparseable_expression_still_answers_ok() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("2 + + )")))
        .mount(&server)
        .await;

    let (status, result) = post_solve(router(vision_config(server.uri())), &photo_base64()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        result.starts_with("Detected: 2++)\n\nError parsing: 2++)\nDetails: "),
        "{result}"
    );
}

#[tokio::test]
async fn vision_api_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid API key", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let (status, result) = post_solve(router(vision_config(server.uri())), &photo_base64()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(result.starts_with("Server Error: OCR error"), "{result}");
}

#[tokio::test]
async fn missing_api_key_leaves_ocr_unavailable() {
    let config = OcrConfig {
        api_key: None,
        ..vision_config("http://127.0.0.1:9".to_string())
    };

    let (status, result) = post_solve(router(config), &photo_base64()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(result.contains("OCR unavailable"), "{result}");
}

#[tokio::test]
async fn busy_vision_api_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("7 - 2")))
        .expect(1)
        .mount(&server)
        .await;

    let config = OcrConfig {
        max_retries: 3,
        ..vision_config(server.uri())
    };
    let (status, result) = post_solve(router(config), &photo_base64()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        result,
        "Detected: 7-2\n\nExpression: 7-2\nSimplified: 5\nResult: 5.0"
    );
}

#[tokio::test]
async fn vision_api_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let config = OcrConfig {
        max_retries: 3,
        ..vision_config(server.uri())
    };
    let (status, result) = post_solve(router(config), &photo_base64()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(result.starts_with("Server Error: OCR error"), "{result}");
    assert!(result.contains("after 3 retries"), "{result}");
}

#[tokio::test]
async fn raw_jpeg_upload_is_sent_as_jpeg() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("data:image/jpeg;base64,"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("3 x 3")))
        .expect(1)
        .mount(&server)
        .await;

    let config = OcrConfig {
        preprocess: false,
        ..vision_config(server.uri())
    };
    let (status, result) =
        post_solve(router(config), &encoded_photo(image::ImageFormat::Jpeg)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(result.ends_with("Result: 9.0"), "{result}");
}
