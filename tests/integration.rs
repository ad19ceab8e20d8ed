use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Datelike, Duration, Utc};
use route_bid_engine::api::rest::router;
use route_bid_engine::config::EngineConfig;
use route_bid_engine::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> axum::Router {
    router(Arc::new(AppState::new(EngineConfig::default(), 1024)))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn empty_post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A job ten days out, so bidding stays open for the whole test.
fn job_payload() -> Value {
    let date = Utc::now().date_naive() + Duration::days(10);
    json!({
        "area": "old town",
        "scheduled_date": date,
        "start_time": "09:00:00",
        "end_time": "12:00:00",
        "estimated_stops": 42,
        "estimated_hours": 3.0,
        "base_pay": 100.0
    })
}

fn all_day_availability() -> Value {
    let weekday = (Utc::now().date_naive() + Duration::days(10)).weekday();
    json!([{ "weekday": weekday, "start": "06:00:00", "end": "20:00:00" }])
}

async fn create_driver(app: &axum::Router, name: &str, rating: f64) -> String {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": name,
                "rating": rating,
                "availability": all_day_availability()
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

async fn create_job(app: &axum::Router) -> String {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/jobs", job_payload()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["jobs"], 0);
    assert_eq!(body["active_bids"], 0);
    assert_eq!(body["assignments"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("active_bids"));
}

#[tokio::test]
async fn create_driver_returns_driver() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": "Alice",
                "rating": 4.5,
                "availability": all_day_availability()
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["status"], "active");
    assert_eq!(body["rating"], 4.5);
    assert_eq!(body["availability"].as_array().unwrap().len(), 1);
    assert!(!body["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn create_driver_empty_name_returns_400() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({ "name": "  ", "rating": 4.5 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_driver_inverted_slot_returns_400() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": "Bob",
                "availability": [{ "weekday": "Mon", "start": "12:00:00", "end": "09:00:00" }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_driver_rating_clamped_to_5() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({ "name": "Max", "rating": 9.9 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["rating"], 5.0);
}

#[tokio::test]
async fn update_driver_status() {
    let app = setup();
    let id = create_driver(&app, "Eve", 4.0).await;

    let res = app
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{id}/status"),
            json!({ "status": "inactive" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "inactive");
}

#[tokio::test]
async fn create_job_returns_open_job_with_deadline() {
    let app = setup();
    let response = app
        .oneshot(json_request("POST", "/jobs", job_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "open");
    assert!(body["assigned_driver_id"].is_null());
    assert!(body["bidding_deadline"].is_string());
}

#[tokio::test]
async fn get_nonexistent_job_returns_404() {
    let app = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/jobs/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bid_validation_errors_map_to_status_codes() {
    let app = setup();
    let driver_id = create_driver(&app, "Gus", 4.0).await;
    let job_id = create_job(&app).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/jobs/{job_id}/bids"),
            json!({ "driver_id": driver_id, "amount": 0.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/jobs/{job_id}/bids"),
            json!({ "driver_id": driver_id, "amount": 90.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/jobs/{job_id}/bids"),
            json!({ "driver_id": driver_id, "amount": 80.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .oneshot(get_request("/jobs?status=bidding"))
        .await
        .unwrap();
    let jobs = body_json(res).await;
    assert_eq!(jobs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn withdraw_bid_reopens_job() {
    let app = setup();
    let driver_id = create_driver(&app, "Fay", 4.2).await;
    let job_id = create_job(&app).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/jobs/{job_id}/bids"),
            json!({ "driver_id": driver_id, "amount": 90.0, "message": "on it" }),
        ))
        .await
        .unwrap();
    let bid = body_json(res).await;
    let bid_id = bid["id"].as_str().unwrap();
    assert_eq!(bid["message"], "on it");

    let res = app
        .clone()
        .oneshot(json_request(
            "DELETE",
            &format!("/bids/{bid_id}"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "withdrawn");

    let res = app
        .clone()
        .oneshot(get_request(&format!("/jobs/{job_id}")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "open");

    let res = app
        .oneshot(empty_post(&format!("/jobs/{job_id}/allocate")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let allocation = body_json(res).await;
    assert_eq!(allocation["outcome"], "no_winner");
    assert_eq!(allocation["detail"], "no_active_bids");
}

#[tokio::test]
async fn full_bidding_flow() {
    let app = setup();
    let cheap = create_driver(&app, "Budget Bea", 3.0).await;
    let pricey = create_driver(&app, "Premium Pat", 4.5).await;
    let job_id = create_job(&app).await;

    for (driver_id, amount) in [(&pricey, 90.0), (&cheap, 80.0)] {
        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/jobs/{job_id}/bids"),
                json!({ "driver_id": driver_id, "amount": amount }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app
        .clone()
        .oneshot(empty_post(&format!("/jobs/{job_id}/allocate")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let allocation = body_json(res).await;
    assert_eq!(allocation["outcome"], "assigned");
    assert_eq!(allocation["detail"]["driver_id"], cheap.as_str());
    assert_eq!(allocation["detail"]["trigger"], "forced");
    assert!(allocation["detail"]["score_breakdown"]["price_score"].as_f64().unwrap() > 0.9);

    let res = app
        .clone()
        .oneshot(empty_post(&format!("/jobs/{job_id}/allocate")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app
        .clone()
        .oneshot(get_request(&format!("/jobs/{job_id}")))
        .await
        .unwrap();
    let job = body_json(res).await;
    assert_eq!(job["status"], "assigned");
    assert_eq!(job["assigned_driver_id"], cheap.as_str());

    let res = app
        .clone()
        .oneshot(get_request(&format!("/jobs/{job_id}/bids")))
        .await
        .unwrap();
    let bids = body_json(res).await;
    let statuses: Vec<&str> = bids
        .as_array()
        .unwrap()
        .iter()
        .map(|bid| bid["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["rejected", "accepted"]);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/jobs/{job_id}/start"),
            json!({ "driver_id": pricey }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/jobs/{job_id}/start"),
            json!({ "driver_id": cheap }),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "in_progress");

    let res = app
        .clone()
        .oneshot(get_request(&format!("/drivers/{cheap}/fairness")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["jobs_won_in_window"], 1);

    let res = app.oneshot(get_request("/assignments")).await.unwrap();
    let assignments = body_json(res).await;
    assert_eq!(assignments.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_job_rejects_bids() {
    let app = setup();
    let driver_id = create_driver(&app, "Cal", 4.0).await;
    let job_id = create_job(&app).await;

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/jobs/{job_id}/bids"),
            json!({ "driver_id": driver_id, "amount": 95.0 }),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(empty_post(&format!("/jobs/{job_id}/cancel")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "cancelled");

    let res = app
        .clone()
        .oneshot(get_request(&format!("/jobs/{job_id}/bids")))
        .await
        .unwrap();
    assert_eq!(body_json(res).await[0]["status"], "rejected");

    let res = app
        .oneshot(empty_post(&format!("/jobs/{job_id}/cancel")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn sweep_endpoint_reports_nothing_due() {
    let app = setup();
    create_job(&app).await;

    let res = app.oneshot(empty_post("/allocations/sweep")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let report = body_json(res).await;
    assert_eq!(report["examined"], 0);
}
