mod common;

use axum::http::{header, Method, StatusCode};
use chrono::Utc;
use common::{call, get, offline_app, send, sign_claims, token, token_with_expiry};
use mole_api::models::Account;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_missing_authorization_header() {
    let app = offline_app();

    let (status, body) = send(&app.router, get("/users/me", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 100);
    assert_eq!(body["error"], "The Authorization header is missing.");
    assert_eq!(app.identity.call_count(), 0);
}

#[tokio::test]
async fn test_non_bearer_header_is_malformed() {
    let app = offline_app();
    let req = axum::http::Request::builder()
        .uri("/users/me")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, body) = send(&app.router, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 100);
    assert_eq!(body["error"], "The Authorization header is malformed.");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = offline_app();
    let token = token_with_expiry(Uuid::new_v4(), &[], -60);

    let (status, body) = send(&app.router, get("/users/me", Some(&token))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 102);
    assert_eq!(body["error"], "Token is expired");
}

#[tokio::test]
async fn test_unknown_key_id_is_rejected() {
    let app = offline_app();
    let now = Utc::now().timestamp();
    let token = sign_claims(
        "rotated-away",
        &json!({ "sub": Uuid::new_v4().to_string(), "iat": now, "exp": now + 600 }),
    );

    let (status, body) = send(&app.router, get("/users/me", Some(&token))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 102);
    assert_eq!(body["error"], "Unknown key ID");
}

#[tokio::test]
async fn test_profile_is_synchronized_once_within_ttl() {
    let app = offline_app();
    let subject = Uuid::new_v4();
    let token = token(subject, &[]);

    let (status, body) = send(&app.router, get("/users/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], subject.to_string());
    assert_eq!(app.identity.call_count(), 1);
    assert!(app.accounts.get(subject).is_some());

    let (status, _) = send(&app.router, get("/users/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.identity.call_count(), 1);
}

#[tokio::test]
async fn test_stale_profile_is_refreshed() {
    let app = offline_app();
    let subject = Uuid::new_v4();
    let long_ago = Utc::now() - chrono::Duration::hours(2);
    app.accounts.insert(Account {
        id: subject,
        name: "Old Name".to_string(),
        email: String::new(),
        phone: String::new(),
        gender: String::new(),
        birth_date: String::new(),
        created_at: long_ago,
        updated_at: long_ago,
    });

    let (status, _) = send(&app.router, get("/users/me", Some(&token(subject, &[])))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.identity.call_count(), 1);
    let refreshed = app.accounts.get(subject).unwrap();
    assert!(refreshed.updated_at > long_ago);
}

#[tokio::test]
async fn test_identity_provider_failure_is_internal() {
    let app = offline_app();
    app.identity.set_failing(true);

    let (status, body) =
        send(&app.router, get("/users/me", Some(&token(Uuid::new_v4(), &[])))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_query_token_fallback_for_get() {
    let app = offline_app();
    let subject = Uuid::new_v4();
    let uri = format!("/users/me?token={}", token(subject, &[]));

    let (status, body) = send(&app.router, get(&uri, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], subject.to_string());
}

#[tokio::test]
async fn test_default_group_cannot_read_doctor_routes() {
    let app = offline_app();
    let token = token(Uuid::new_v4(), &[]);

    for uri in ["/requests", "/reports", "/lesions"] {
        let (status, body) = send(&app.router, get(uri, Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["code"], 105);
        assert_eq!(body["error"], "Insufficient permissions");
    }
    assert_eq!(app.identity.call_count(), 0);
}

#[tokio::test]
async fn test_doctor_cannot_write_catalog() {
    let app = offline_app();
    let token = token(Uuid::new_v4(), &["Doctors"]);

    let (status, body) = send(
        &app.router,
        common::request(
            Method::POST,
            "/body-parts",
            Some(&token),
            Some(json!({ "name": "Left arm", "displayed": true })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 105);
}

#[tokio::test]
async fn test_invalid_path_id() {
    let app = offline_app();
    let token = token(Uuid::new_v4(), &[]);

    let (status, body) =
        send(&app.router, get("/users/me/lesions/not-a-uuid", Some(&token))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid ID supplied");
}

#[tokio::test]
async fn test_media_download_redirects_owner() {
    let app = offline_app();
    let subject = Uuid::new_v4();
    let uri = format!("/media/images/{}/mole.png", subject);

    let response = call(&app.router, get(&uri, Some(&token(subject, &[])))).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert_eq!(
        location,
        format!(
            "https://storage.test/molepatrol-photos/private/ap-southeast-2:{}/mole.png?expires=86400",
            subject
        )
    );
}

#[tokio::test]
async fn test_media_download_of_other_account() {
    let app = offline_app();
    let uri = format!("/media/images/{}/mole.png", Uuid::new_v4());

    let (status, _) = send(&app.router, get(&uri, Some(&token(Uuid::new_v4(), &[])))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = call(&app.router, get(&uri, Some(&token(Uuid::new_v4(), &["Doctors"])))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_filter_on_unknown_column_is_internal() {
    let app = offline_app();
    let token = token(Uuid::new_v4(), &[]);

    let (status, body) = send(
        &app.router,
        get("/users/me/lesions?filters%5Bsecret_col%5D=eq:1", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal server error" }));
    assert!(!body.to_string().contains("secret_col"));
}

#[tokio::test]
async fn test_between_filter_with_one_operand() {
    let app = offline_app();
    let token = token(Uuid::new_v4(), &[]);

    let (status, body) = send(
        &app.router,
        get("/users/me/lesions?filters%5Bcreated_at%5D=between:5", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("needs two operands"));
}

#[tokio::test]
async fn test_filter_operand_of_wrong_type() {
    let app = offline_app();
    let token = token(Uuid::new_v4(), &[]);

    let (status, body) = send(
        &app.router,
        get("/users/me/lesions?filters%5Bid%5D=eq:notauuid", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid value for 'id': expected a UUID");
}

fn upload_request(token: &str, form: &[(&str, &str)]) -> axum::http::Request<axum::body::Body> {
    let body = serde_urlencoded::to_string(form).unwrap();
    axum::http::Request::builder()
        .method(Method::POST)
        .uri("/media/images/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(axum::body::Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_media_upload() {
    let app = offline_app();
    let subject = Uuid::new_v4();
    let token = token(subject, &[]);

    let (status, body) = send(
        &app.router,
        upload_request(
            &token,
            &[
                ("file_name", "mole.png"),
                ("file_base64", "data:image/png;base64,aGVsbG8="),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 200);
    assert_eq!(body["url"], format!("/media/images/{}/mole.png", subject));

    let object = mole_api::services::ObjectRef::new(
        "molepatrol-photos",
        format!("private/ap-southeast-2:{}/mole.png", subject),
    );
    let (content_type, bytes) = app.storage.stored(&object).unwrap();
    assert_eq!(content_type, "image/png");
    assert_eq!(bytes, b"hello".to_vec());
}

#[tokio::test]
async fn test_media_upload_rejects_bad_payloads() {
    let app = offline_app();
    let subject = Uuid::new_v4();
    let token = token(subject, &[]);

    let (status, body) = send(
        &app.router,
        upload_request(
            &token,
            &[
                ("file_name", "mole.gif"),
                ("file_base64", "data:image/gif;base64,aGVsbG8="),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["message"], "Not support content-type: image/gif");

    let other = Uuid::new_v4().to_string();
    let (status, _) = send(
        &app.router,
        upload_request(
            &token,
            &[
                ("account_id", other.as_str()),
                ("file_name", "mole.png"),
                ("file_base64", "data:image/png;base64,aGVsbG8="),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_database_outage() {
    let app = offline_app();

    let (status, body) = send(&app.router, get("/health", None)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["service"], "mole-api");
    assert_eq!(body["checks"]["postgresql"], "unhealthy");
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = offline_app();

    let response = call(&app.router, get("/users/me", None)).await;

    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers()["x-content-type-options"],
        "nosniff"
    );
}
