//! Text and image recommendation routes against the fixture catalog.

use axum::http::StatusCode;
use serde_json::{Value, json};
use shopsmarter_integration_tests::{Part, TEST_MAX_UPLOAD_BYTES, TestApp, png_bytes};

fn ids(body: &Value) -> Vec<String> {
    body["products"]
        .as_array()
        .expect("products array")
        .iter()
        .map(|p| p["id"].as_str().expect("string id").to_string())
        .collect()
}

#[tokio::test]
async fn test_text_recommendations_rank_by_keywords() {
    let mut app = TestApp::with_catalog(None).await;

    let response = app
        .post_json(
            "/get_recommendations",
            &json!({ "prompt": "a red floral dress", "top_k": 2 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(ids(&body), ["1002", "1004"]);
    assert_eq!(body["products"][0]["price"], "$79.50");
    assert_eq!(
        body["products"][0]["imageUrl"],
        "/static/product_images_db/1002.jpg"
    );
    assert!(body["products"][0].get("embedding").is_none());
    assert_eq!(body["refinement"]["error"], "Gemini API key not configured.");

    let keywords: Vec<&str> = body["keywords"]
        .as_array()
        .expect("keywords")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(keywords.contains(&"dress"));
    assert!(!keywords.contains(&"a"));
}

#[tokio::test]
async fn test_text_recommendations_default_top_k() {
    let mut app = TestApp::with_catalog(None).await;
    let body = app
        .post_json("/get_recommendations", &json!({ "prompt": "boots" }))
        .await
        .json();
    assert_eq!(ids(&body).first().map(String::as_str), Some("1003"));
    assert_eq!(ids(&body).len(), 4);
    assert_eq!(body["products"][3]["imageUrl"], "/static/placeholder.png");
}

#[tokio::test]
async fn test_text_recommendations_need_prompt() {
    let mut app = TestApp::with_catalog(None).await;

    let blank = app
        .post_json("/get_recommendations", &json!({ "prompt": "   " }))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    assert_eq!(blank.json()["error"], "No prompt provided");

    let missing = app.post_json("/get_recommendations", &json!({})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_text_recommendations_malformed_json() {
    let mut app = TestApp::with_catalog(None).await;
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/get_recommendations")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .expect("request");
    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["error"].is_string());
}

#[tokio::test]
async fn test_upload_ranks_visually_and_serves_file() {
    let mut app = TestApp::with_catalog(Some(vec![0.0, 0.0, 1.0])).await;
    let png = png_bytes();

    let response = app
        .post_multipart(
            "/upload_image",
            &[
                Part::File {
                    name: "image",
                    file_name: "look.png",
                    content_type: "image/png",
                    bytes: &png,
                },
                Part::Text {
                    name: "top_k",
                    value: "2",
                },
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());

    let body = response.json();
    assert_eq!(ids(&body).len(), 2);
    assert_eq!(ids(&body)[0], "1003");
    assert_eq!(
        body["image_description"],
        "Image description not available (OpenAI client not configured)."
    );

    let url = body["uploaded_image_url"]
        .as_str()
        .expect("uploaded url")
        .to_string();
    assert!(url.starts_with("/static/uploads/"));
    assert!(url.ends_with(".png"));

    let served = app.get(&url).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.body.as_ref(), png.as_slice());
}

#[tokio::test]
async fn test_upload_prompt_adds_keywords() {
    let mut app = TestApp::with_catalog(Some(vec![0.0, 0.0, 1.0])).await;
    let png = png_bytes();

    let body = app
        .post_multipart(
            "/upload_image",
            &[
                Part::File {
                    name: "image",
                    file_name: "look.jpeg",
                    content_type: "image/jpeg",
                    bytes: &png,
                },
                Part::Text {
                    name: "prompt",
                    value: "floral dress",
                },
            ],
        )
        .await
        .json();

    // 1002 gains two keyword matches (4 points), boots keep the visual 10
    assert_eq!(ids(&body)[..2], ["1003", "1002"]);
}

#[tokio::test]
async fn test_upload_without_model_uses_text_only() {
    let mut app = TestApp::with_catalog(None).await;
    let png = png_bytes();

    let body = app
        .post_multipart(
            "/upload_image",
            &[
                Part::File {
                    name: "image",
                    file_name: "look.png",
                    content_type: "image/png",
                    bytes: &png,
                },
                Part::Text {
                    name: "prompt",
                    value: "sneakers",
                },
            ],
        )
        .await
        .json();
    assert_eq!(ids(&body)[0], "1004");
}

#[tokio::test]
async fn test_upload_validation() {
    let mut app = TestApp::with_catalog(None).await;
    let png = png_bytes();

    let no_image = app
        .post_multipart(
            "/upload_image",
            &[Part::Text {
                name: "prompt",
                value: "shirt",
            }],
        )
        .await;
    assert_eq!(no_image.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_image.json()["error"], "No image file provided");

    let empty = app
        .post_multipart(
            "/upload_image",
            &[Part::File {
                name: "image",
                file_name: "",
                content_type: "application/octet-stream",
                bytes: b"",
            }],
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.json()["error"], "No selected file");

    let wrong_type = app
        .post_multipart(
            "/upload_image",
            &[Part::File {
                name: "image",
                file_name: "notes.txt",
                content_type: "text/plain",
                bytes: &png,
            }],
        )
        .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_type.json()["error"], "File type not allowed");
}

#[tokio::test]
async fn test_upload_too_large() {
    let mut app = TestApp::with_catalog(None).await;

    // Over the configured limit but inside the body limit slack
    let oversized = vec![0_u8; TEST_MAX_UPLOAD_BYTES + 1024];
    let response = app
        .post_multipart(
            "/upload_image",
            &[Part::File {
                name: "image",
                file_name: "big.png",
                content_type: "image/png",
                bytes: &oversized,
            }],
        )
        .await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);

    // Past the body limit, rejected while streaming
    let huge = vec![0_u8; TEST_MAX_UPLOAD_BYTES * 2];
    let response = app
        .post_multipart(
            "/upload_image",
            &[Part::File {
                name: "image",
                file_name: "huge.png",
                content_type: "image/png",
                bytes: &huge,
            }],
        )
        .await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}
