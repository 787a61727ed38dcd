//! Render and batch-send endpoints exercised through the actix test service.

mod common;

use actix_web::{test, web, App};
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use psi_training_server::template::models::TemplateKind;
use psi_training_server::AppState;

use common::{
    api_scope, state_with, template_for, trainee_named, InMemoryStore, MockObjectStorage,
    RecordingMailer, StubRenderer,
};

fn fixture() -> (std::sync::Arc<InMemoryStore>, std::sync::Arc<RecordingMailer>, AppState) {
    let store = InMemoryStore::new();
    let mailer = RecordingMailer::new();
    let state = state_with(
        store.clone(),
        MockObjectStorage::new(),
        mailer.clone(),
        StubRenderer::new(),
    );
    (store, mailer, state)
}

fn render_body(course_id: Uuid, schedule_id: Option<Uuid>) -> serde_json::Value {
    json!({
        "trainee": {
            "first_name": "maria",
            "last_name": "santos",
            "middle_initial": "P",
            "certificate_number": "PSI-FIRSTAID-000001",
            "batch_number": "B-7",
            "picture_2x2_url": null,
            "schedule_id": schedule_id
        },
        "courseName": "First Aid",
        "courseId": course_id,
        "templateType": "completion"
    })
}

#[actix_web::test]
async fn render_returns_pdf_bytes_with_attachment_disposition() {
    let (store, _, state) = fixture();
    let app =
        test::init_service(App::new().app_data(web::Data::new(state)).service(api_scope())).await;
    let course = store.insert_course("First Aid");
    store.insert_template(template_for(course.id, TemplateKind::Completion));

    let req = test::TestRequest::post()
        .uri("/api/certificates/render")
        .set_json(render_body(course.id, None))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("Content-Type").unwrap(),
        "application/pdf"
    );
    let disposition = resp
        .headers()
        .get("Content-Disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"Completion_"));
    assert!(disposition.contains("PSI-FIRSTAID-000001"));

    let body = test::read_body(resp).await;
    assert!(body.starts_with(b"%PDF"));
}

#[actix_web::test]
async fn render_rejects_blank_required_fields() {
    let (store, _, state) = fixture();
    let app =
        test::init_service(App::new().app_data(web::Data::new(state)).service(api_scope())).await;
    let course = store.insert_course("First Aid");

    let mut body = render_body(course.id, None);
    body["trainee"]["first_name"] = json!("   ");
    body["courseName"] = json!("");

    let req = test::TestRequest::post()
        .uri("/api/certificates/render")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("trainee.first_name"));
    assert!(details.contains("courseName"));
}

#[actix_web::test]
async fn render_without_a_stored_template_is_not_found() {
    let (store, _, state) = fixture();
    let app =
        test::init_service(App::new().app_data(web::Data::new(state)).service(api_scope())).await;
    let course = store.insert_course("First Aid");

    let req = test::TestRequest::post()
        .uri("/api/certificates/render")
        .set_json(render_body(course.id, None))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn batch_send_streams_events_and_defaults_to_completion() {
    let (store, mailer, state) = fixture();
    let app =
        test::init_service(App::new().app_data(web::Data::new(state)).service(api_scope())).await;
    let course = store.insert_course("First Aid");
    let schedule = store.insert_regular_schedule(
        course.id,
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
    );
    store.insert_trainee(trainee_named(
        schedule.id,
        "Ana",
        "Lim",
        Some("PSI-FIRSTAID-000001"),
        Some("ana@example.com"),
    ));
    store.insert_template(template_for(course.id, TemplateKind::Completion));

    let req = test::TestRequest::post()
        .uri("/api/certificates/batch-send")
        .set_json(json!({ "scheduleId": schedule.id }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("Content-Type").unwrap(),
        "text/event-stream"
    );

    // The stream closes after the terminal event, so the whole body can be
    // collected and parsed frame by frame.
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    let events: Vec<serde_json::Value> = body
        .split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            let data = frame.strip_prefix("data: ").unwrap();
            serde_json::from_str(data).unwrap()
        })
        .collect();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["type"], "progress");
    assert_eq!(events[0]["current"], 0);
    assert_eq!(events[1]["current"], 1);
    assert_eq!(events[1]["lastSent"], "Ana Lim");
    assert_eq!(events[2]["type"], "complete");
    assert_eq!(events[2]["successCount"], 1);
    assert_eq!(events[2]["failCount"], 0);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@example.com");
    assert!(sent[0].subject.starts_with("Completion Certificate"));
}

#[actix_web::test]
async fn batch_send_for_unknown_schedule_is_a_json_error_not_a_stream() {
    let (_, _, state) = fixture();
    let app =
        test::init_service(App::new().app_data(web::Data::new(state)).service(api_scope())).await;

    let req = test::TestRequest::post()
        .uri("/api/certificates/batch-send")
        .set_json(json!({ "scheduleId": Uuid::new_v4() }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Schedule not found");
}

#[actix_web::test]
async fn batch_send_rejects_unknown_template_type() {
    let (store, _, state) = fixture();
    let app =
        test::init_service(App::new().app_data(web::Data::new(state)).service(api_scope())).await;
    let course = store.insert_course("First Aid");
    let schedule = store.insert_regular_schedule(
        course.id,
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
    );

    let req = test::TestRequest::post()
        .uri("/api/certificates/batch-send")
        .set_json(json!({ "scheduleId": schedule.id, "templateType": "diploma" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
}
