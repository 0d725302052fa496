//! HTTP behaviour of the chat API, driven in-process through the router.

use std::sync::Arc;

use attachment_uploader::{AttachmentUploader, LocalBlobStorage, UploadConfig};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chat_database::models::{Booking, ServiceProvider};
use chat_database::{booking, Database};
use chat_server::{app, AppState};
use delivery_bus::DeliveryBus;
use messaging::{Messenger, MessagingConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const CUSTOMER: &str = "customer-1";
const PROVIDER: &str = "provider-owner-1";
const OUTSIDER: &str = "mallory";

struct Harness {
    app: Router,
    _uploads: TempDir,
}

async fn harness(api_token: Option<&str>) -> Harness {
    let db = Database::in_memory().await.unwrap();
    booking::create_provider(
        db.pool(),
        &ServiceProvider {
            id: "prov-1".to_string(),
            user_id: PROVIDER.to_string(),
        },
    )
    .await
    .unwrap();
    for (id, status) in [("C", "accepted"), ("DONE", "completed")] {
        booking::create_booking(
            db.pool(),
            &Booking {
                id: id.to_string(),
                customer_id: CUSTOMER.to_string(),
                provider_id: "prov-1".to_string(),
                status: status.to_string(),
            },
        )
        .await
        .unwrap();
    }

    let uploads = tempfile::tempdir().unwrap();
    let upload = UploadConfig::default().with_public_base_url("https://chat.example.com");
    let uploader = AttachmentUploader::new(
        Arc::new(LocalBlobStorage::new(uploads.path())),
        upload.clone(),
    );
    let messenger = Messenger::with_sqlite_bookings(
        db,
        DeliveryBus::default(),
        uploader,
        MessagingConfig::default(),
    );

    let state = AppState::new(Arc::new(messenger), api_token.map(str::to_string));
    Harness {
        app: app(state, &upload, uploads.path()),
        _uploads: uploads,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let (status, bytes) = send(app, request).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let h = harness(None).await;
    let (status, body) = call(&h.app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_identity_and_token_required() {
    let h = harness(Some("s3cret")).await;

    let (status, body) = call(&h.app, Method::GET, "/v1/unread", Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "auth_error");

    let request = Request::builder()
        .uri("/v1/unread")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/v1/unread")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .header("x-user-id", CUSTOMER)
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"count": 0}));
}

#[tokio::test]
async fn test_send_and_read_history() {
    let h = harness(None).await;

    let (status, sent) = call(
        &h.app,
        Method::POST,
        "/v1/conversations/C/messages",
        Some(CUSTOMER),
        Some(json!({"text": "Is 9am okay?"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["receiver_id"], PROVIDER);
    assert_eq!(sent["content"], json!({"kind": "text", "text": "Is 9am okay?"}));

    let (status, unread) = call(&h.app, Method::GET, "/v1/unread", Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unread["count"], 1);

    let (_, history) = call(
        &h.app,
        Method::GET,
        "/v1/conversations/C/messages",
        Some(PROVIDER),
        None,
    )
    .await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, updated) = call(
        &h.app,
        Method::POST,
        "/v1/conversations/C/read",
        Some(PROVIDER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated[0]["read"], true);

    let uri = format!("/v1/conversations/C/messages?after={}", sent["id"]);
    let (_, after) = call(&h.app, Method::GET, &uri, Some(CUSTOMER), None).await;
    assert_eq!(after, json!([]));
}

#[tokio::test]
async fn test_error_statuses() {
    let h = harness(None).await;

    let (status, body) = call(
        &h.app,
        Method::GET,
        "/v1/conversations/C/messages",
        Some(OUTSIDER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "access_denied");

    let (status, body) = call(&h.app, Method::GET, "/v1/conversations/nope", Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["entity"], "Booking");

    let (status, body) = call(
        &h.app,
        Method::POST,
        "/v1/conversations/DONE/messages",
        Some(CUSTOMER),
        Some(json!({"text": "hello?"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["status"], "completed");

    let (status, body) = call(
        &h.app,
        Method::POST,
        "/v1/conversations/C/messages",
        Some(CUSTOMER),
        Some(json!({"text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["type"], "validation");

    let (_, sent) = call(
        &h.app,
        Method::POST,
        "/v1/conversations/C/messages",
        Some(CUSTOMER),
        Some(json!({"text": "mine"})),
    )
    .await;
    let uri = format!("/v1/messages/{}", sent["id"]);
    let (status, body) = call(&h.app, Method::DELETE, &uri, Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "forbidden");

    let (status, _) = call(&h.app, Method::DELETE, &uri, Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_legacy_body_is_classified() {
    let h = harness(None).await;

    let (status, sent) = call(
        &h.app,
        Method::POST,
        "/v1/conversations/C/messages",
        Some(PROVIDER),
        Some(json!({"body": "https://cdn.example.com/chat-images/C/x/1.png"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["content"]["kind"], "attachment");

    let (_, chats) = call(&h.app, Method::GET, "/v1/chats", Some(CUSTOMER), None).await;
    assert_eq!(chats[0]["conversation_id"], "C");
    assert_eq!(chats[0]["other_participant"], PROVIDER);
    assert_eq!(chats[0]["unread_count"], 1);

    let (_, per) = call(&h.app, Method::GET, "/v1/unread/conversations", Some(CUSTOMER), None).await;
    assert_eq!(per, json!({"C": 1}));

    let (status, cleared) = call(
        &h.app,
        Method::DELETE,
        "/v1/conversations/C/messages",
        Some(CUSTOMER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared, json!({"count": 1}));
}

#[tokio::test]
async fn test_upload_then_fetch_file() {
    let h = harness(None).await;
    let bytes = vec![0x89u8, b'P', b'N', b'G', 1, 2, 3, 4];

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/conversations/C/attachments")
        .header("x-user-id", CUSTOMER)
        .header(header::CONTENT_TYPE, "image/png")
        .header("x-file-name", "door.png")
        .body(Body::from(bytes.clone()))
        .unwrap();
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    let uploaded: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(uploaded["mime"], "image/png");
    let key = uploaded["key"].as_str().unwrap();
    assert!(key.starts_with("C/customer-1/"));

    let request = Request::builder()
        .uri(format!("/chat-images/{}", key))
        .body(Body::empty())
        .unwrap();
    let (status, served) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, bytes);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/conversations/C/attachments")
        .header("x-user-id", CUSTOMER)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header("x-file-name", "invoice.pdf")
        .body(Body::from(vec![1u8; 16]))
        .unwrap();
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_uploaded_file_served_as_checked_image_type() {
    let h = harness(None).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/conversations/C/attachments")
        .header("x-user-id", CUSTOMER)
        .header(header::CONTENT_TYPE, "image/png")
        .header("x-file-name", "pwn.html")
        .body(Body::from("<script>alert(document.cookie)</script>"))
        .unwrap();
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    let uploaded: Value = serde_json::from_slice(&body).unwrap();
    let key = uploaded["key"].as_str().unwrap();
    assert!(key.ends_with(".png"), "stored as {key}");

    let request = Request::builder()
        .uri(format!("/chat-images/{}", key))
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let served_as = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(served_as.starts_with("image/"), "served as {served_as}");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/conversations/C/attachments")
        .header("x-user-id", CUSTOMER)
        .header(header::CONTENT_TYPE, "image/svg+xml")
        .header("x-file-name", "logo.svg")
        .body(Body::from("<svg onload=\"alert(1)\"/>"))
        .unwrap();
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
