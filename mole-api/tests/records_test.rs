//! Record lifecycle against a live PostgreSQL. Run with
//! `TEST_DATABASE_URL=... cargo test -- --ignored`.

mod common;

use axum::http::{Method, StatusCode};
use common::{database_app, get, request, send, token, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

async fn create(app: &TestApp, uri: &str, token: &str, body: Value) -> Value {
    let (status, body) = send(&app.router, request(Method::POST, uri, Some(token), Some(body))).await;
    assert_eq!(status, StatusCode::CREATED, "POST {} -> {}", uri, body);
    body
}

async fn body_part(app: &TestApp, displayed: bool) -> String {
    let admin = token(Uuid::new_v4(), &["Administrators"]);
    let part = create(
        app,
        "/body-parts",
        &admin,
        json!({ "name": format!("part-{}", Uuid::new_v4()), "displayed": displayed }),
    )
    .await;
    part["id"].as_str().unwrap().to_string()
}

async fn lesion(app: &TestApp, token: &str, body_part_id: &str) -> String {
    let lesion = create(
        app,
        "/users/me/lesions",
        token,
        json!({ "name": "Left shoulder", "body_part_id": body_part_id }),
    )
    .await;
    lesion["id"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_lesions_of_other_accounts_are_not_found() {
    let app = database_app().await;
    let part = body_part(&app, true).await;
    let owner = token(Uuid::new_v4(), &[]);
    let stranger = token(Uuid::new_v4(), &[]);
    let lesion_id = lesion(&app, &owner, &part).await;
    let uri = format!("/users/me/lesions/{}", lesion_id);

    let (status, body) = send(&app.router, get(&uri, Some(&owner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], lesion_id);

    let (status, body) = send(&app.router, get(&uri, Some(&stranger))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Lesion not found");

    let (status, _) = send(&app.router, request(Method::DELETE, &uri, Some(&stranger), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app.router, request(Method::DELETE, &uri, Some(&owner), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], lesion_id);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_caller_filters_cannot_widen_ownership() {
    let app = database_app().await;
    let part = body_part(&app, true).await;
    let owner_id = Uuid::new_v4();
    let owner = token(owner_id, &[]);
    let stranger = token(Uuid::new_v4(), &[]);
    lesion(&app, &owner, &part).await;
    lesion(&app, &stranger, &part).await;

    let uri = format!("/users/me/lesions?filters[account_id]=eq:{}", owner_id);
    let (status, body) = send(&app.router, get(&uri, Some(&stranger))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (_, body) = send(&app.router, get(&uri, Some(&owner))).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_pages_are_disjoint_and_ordered() {
    let app = database_app().await;
    let part = body_part(&app, true).await;
    let owner = token(Uuid::new_v4(), &[]);
    for name in ["e", "c", "a", "d", "b"] {
        create(
            &app,
            "/users/me/lesions",
            &owner,
            json!({ "name": name, "body_part_id": part }),
        )
        .await;
    }

    let mut names = Vec::new();
    for offset in [0, 2, 4] {
        let uri = format!("/users/me/lesions?order_by=name&offset={}&limit=2", offset);
        let (status, page) = send(&app.router, get(&uri, Some(&owner))).await;
        assert_eq!(status, StatusCode::OK);
        names.extend(
            page.as_array()
                .unwrap()
                .iter()
                .map(|lesion| lesion["name"].as_str().unwrap().to_string()),
        );
    }

    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_lesion_includes_body_part_and_latest_report() {
    let app = database_app().await;
    let part = body_part(&app, true).await;
    let owner = token(Uuid::new_v4(), &[]);
    let lesion_id = lesion(&app, &owner, &part).await;
    let reports_uri = format!("/users/me/lesions/{}/reports", lesion_id);
    create(&app, &reports_uri, &owner, json!({ "photos": ["first.png"] })).await;
    let latest = create(&app, &reports_uri, &owner, json!({ "photos": ["second.png"] })).await;

    let (status, body) = send(
        &app.router,
        get(
            "/users/me/lesions?include_body_parts=true&include_last_reports=true",
            Some(&owner),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let lesions = body.as_array().unwrap();
    assert_eq!(lesions.len(), 1);
    assert_eq!(lesions[0]["body_part"]["id"], part);
    assert_eq!(lesions[0]["last_report"]["id"], latest["id"]);
    assert!(lesions[0].get("last_request").is_none());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_displayed_filter_on_body_parts() {
    let app = database_app().await;
    let hidden = body_part(&app, false).await;
    let shown = body_part(&app, true).await;

    let (status, body) = send(&app.router, get("/body-parts?displayed=true&limit=1000", None)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|part| part["id"].as_str())
        .collect();
    assert!(ids.contains(&shown.as_str()));
    assert!(!ids.contains(&hidden.as_str()));

    // Anything but true or false leaves the list unfiltered.
    let (_, body) = send(&app.router, get("/body-parts?displayed=maybe&limit=1000", None)).await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|part| part["id"].as_str())
        .collect();
    assert!(ids.contains(&shown.as_str()));
    assert!(ids.contains(&hidden.as_str()));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_report_answers_are_diffed_on_update() {
    let app = database_app().await;
    let admin = token(Uuid::new_v4(), &["Administrators"]);
    let owner = token(Uuid::new_v4(), &[]);
    let part = body_part(&app, true).await;
    let lesion_id = lesion(&app, &owner, &part).await;

    let mut questions = Vec::new();
    for name in ["Itchy?", "Bleeding?", "Changed size?"] {
        let question = create(
            &app,
            "/questions",
            &admin,
            json!({ "name": name, "type": "boolean", "answers": [true, false] }),
        )
        .await;
        questions.push(question["id"].as_str().unwrap().to_string());
    }

    let reports_uri = format!("/users/me/lesions/{}/reports", lesion_id);
    let report = create(
        &app,
        &reports_uri,
        &owner,
        json!({
            "photos": ["a.png"],
            "answers": [
                { "question_id": questions[0], "answer": true },
                { "question_id": questions[1], "answer": false }
            ]
        }),
    )
    .await;

    let report_uri = format!("{}/{}", reports_uri, report["id"].as_str().unwrap());
    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            &report_uri,
            Some(&owner),
            Some(json!({
                "photos": ["a.png", "b.png"],
                "answers": [
                    { "question_id": questions[1], "answer": true },
                    { "question_id": questions[2], "answer": false }
                ]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        get(
            &format!("{}?include_answers=true&include_questions=true", reports_uri),
            Some(&owner),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let answers = body[0]["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 2);
    let answered: Vec<(&str, &Value)> = answers
        .iter()
        .map(|a| (a["question_id"].as_str().unwrap(), &a["answer"]))
        .collect();
    assert!(answered.contains(&(questions[1].as_str(), &json!(true))));
    assert!(answered.contains(&(questions[2].as_str(), &json!(false))));
    assert!(answers.iter().all(|a| a["question"]["id"] == a["question_id"]));
    assert_eq!(body[0]["photos"], json!(["a.png", "b.png"]));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_request_lifecycle_with_doctor_response() {
    let app = database_app().await;
    let part = body_part(&app, true).await;
    let owner_id = Uuid::new_v4();
    let owner = token(owner_id, &[]);
    let stranger = token(Uuid::new_v4(), &[]);
    let doctor = token(Uuid::new_v4(), &["Doctors"]);

    let lesion_id = lesion(&app, &owner, &part).await;
    let reports_uri = format!("/users/me/lesions/{}/reports", lesion_id);
    let report = create(&app, &reports_uri, &owner, json!({ "photos": ["a.png"] })).await;
    let report_id = report["id"].as_str().unwrap().to_string();

    let created = create(&app, "/users/me/requests", &owner, json!({ "reports": [report_id] })).await;
    assert_eq!(created["status"], "Open");
    let request_id = created["id"].as_str().unwrap().to_string();

    // The linked report is now submitted under the request.
    let (_, reports) = send(&app.router, get(&reports_uri, Some(&owner))).await;
    assert_eq!(reports[0]["request_id"], request_id);
    assert_eq!(reports[0]["status"], "Submitted");

    // Someone else's report cannot join the request.
    let stranger_lesion = lesion(&app, &stranger, &part).await;
    let (status, _) = send(
        &app.router,
        request(
            Method::POST,
            &format!("/users/me/lesions/{}/reports", stranger_lesion),
            Some(&stranger),
            Some(json!({ "request_id": request_id, "photos": [] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        get(&format!("/users/me/requests/{}", request_id), Some(&stranger)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Doctors see it in the paged listing.
    let (status, page) = send(
        &app.router,
        get(&format!("/requests?account_id={}&include_accounts=true", owner_id), Some(&doctor)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["id"], request_id);
    assert_eq!(page["data"][0]["account"]["id"], owner_id.to_string());

    let (status, answered) = send(
        &app.router,
        request(
            Method::PUT,
            &format!("/requests/{}", request_id),
            Some(&doctor),
            Some(json!({
                "status": "Answered",
                "answer_text": "Benign naevus, review in twelve months",
                "answered_by": "Dr. Lee",
                "answered_at": 1704067200,
                "notify_msg": "Your results are ready",
                "reports": [{ "id": report_id, "consultation_result": "Benign" }]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answered["status"], "Answered");
    assert_eq!(app.push.send_count(), 1);

    let (_, reports) = send(&app.router, get(&reports_uri, Some(&owner))).await;
    assert_eq!(reports[0]["consultation_result"], "Benign");

    let (_, mine) = send(&app.router, get("/users/me/requests?skip_answer=true", Some(&owner))).await;
    assert_eq!(mine[0]["id"], request_id);
    assert!(mine[0]["answer_text"].is_null());

    let (_, full) = send(
        &app.router,
        get(
            &format!("/users/me/requests/{}?include_reports=true&include_lesions=true", request_id),
            Some(&owner),
        ),
    )
    .await;
    assert_eq!(full["answer_text"], "Benign naevus, review in twelve months");
    assert_eq!(full["reports"][0]["id"], report_id);
    assert_eq!(full["reports"][0]["lesion"]["id"], lesion_id);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_profiles_are_persisted_on_first_call() {
    let app = database_app().await;
    let subject = Uuid::new_v4();

    let (status, body) = send(&app.router, get("/users/me", Some(&token(subject, &[])))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], subject.to_string());
    assert!(app.db.find_account(subject).await.unwrap().is_some());
    assert_eq!(app.identity.call_count(), 1);
}
