use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crash_risk_core::Predictor;

use crate::{config::Config, create_router, AppState};

fn model_path() -> String {
    format!("{}/../models/severe_injury_model.json", env!("CARGO_MANIFEST_DIR"))
}

fn app() -> Router {
    let config = Config {
        port: 0,
        model_path: model_path(),
        explain_top_n: 12,
        environment: "test".to_string(),
    };
    let predictor = Predictor::from_path(&config.model_path).unwrap().with_top_n(config.explain_top_n);
    create_router(AppState { predictor, config })
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn post_json(uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app()
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let json = serde_json::from_str(&body_string(response).await).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model"], "severe_injury_model");
}

#[tokio::test]
async fn test_index_preselects_defaults() {
    let response = app()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("<option value=\"2\" selected>No alcohol involved</option>"));
    assert!(html.contains("<option value=\"3\" selected>Tuesday</option>"));
    assert!(html.contains("name=\"body_typ_group\""));
    assert!(html.contains("<code>0.25</code>"));
    assert!(!html.contains("id=\"result\""));
}

#[tokio::test]
async fn test_api_predict_default_scenario() {
    let (status, json) = post_json("/api/v1/predict", json!({"threshold": 0.25})).await;
    assert_eq!(status, StatusCode::OK);

    let p = json["probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p));
    let expected = if p >= 0.25 { "HIGH" } else { "LOW" };
    assert_eq!(json["label"], expected);
    assert_eq!(json["record"]["AGE_IM"], 30);
    assert_eq!(json["explanation"]["status"], "available");
    assert!(json["explanation"]["contributions"].as_array().unwrap().len() <= 12);
}

#[tokio::test]
async fn test_api_predict_rejects_out_of_range() {
    let (status, json) = post_json("/api/v1/predict", json!({"HOUR_acc": 30})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("hour_acc"));

    let (status, _) = post_json("/api/v1/predict", json!({"threshold": 1.0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_predict_rejects_codes_outside_dictionary() {
    let (status, json) = post_json("/api/v1/predict", json!({"SEX_IM": 42, "body_typ_group": 5000})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = json["error"].as_str().unwrap();
    assert!(message.contains("SEX_IM=42"));
    assert!(message.contains("body_typ_group=5000"));
}

#[tokio::test]
async fn test_form_submit_unknown_code_is_not_scored() {
    let response = app()
        .oneshot(
            Request::post("/predict")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("SEX_IM=42"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_string(response).await;
    assert!(html.contains("SEX_IM=42 not in the code dictionary"));
    assert!(!html.contains("id=\"result\""));
}

#[tokio::test]
async fn test_low_confidence_warning_in_report() {
    let unknown = json!({
        "SEX_IM": 9, "ALCOHOL": 9, "DRUGS": 9, "LGTCON_IM": 9,
        "WEATHR_IM": 99, "REGION": 9, "REL_ROAD": 99
    });
    let (status, json) = post_json("/api/v1/predict", unknown).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["confidence"]["low_confidence"], true);
    assert!((json["confidence"]["unknown_rate"].as_f64().unwrap() - 0.4375).abs() < 1e-12);
}

#[tokio::test]
async fn test_form_submit_renders_result() {
    let response = app()
        .oneshot(
            Request::post("/predict")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("threshold=0.01&AGE_IM=70&body_typ_group=80&exact_body_typ="))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("id=\"result\""));
    assert!(html.contains("HIGH risk (p ≥ 0.01)"));
    assert!(html.contains("<option value=\"80\" selected>"));
    assert!(html.contains("<svg"));
}

#[tokio::test]
async fn test_form_submit_validation_error_is_html() {
    let response = app()
        .oneshot(
            Request::post("/predict")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("AGE_IM=130"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_string(response).await;
    assert!(html.contains("class=\"error\""));
    assert!(html.contains("age_im"));
}

#[tokio::test]
async fn test_decide_does_not_rescore() {
    let (status, json) = post_json("/api/v1/decide", json!({"probability": 0.25, "threshold": 0.25})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["label"], "HIGH");

    let (_, json) = post_json("/api/v1/decide", json!({"probability": 0.2499})).await;
    assert_eq!(json["label"], "LOW");
    assert_eq!(json["threshold"], 0.25);

    let (status, _) = post_json("/api/v1/decide", json!({"probability": 1.2})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_codes_and_model_metadata() {
    let response = app()
        .oneshot(Request::get("/api/v1/codes").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let codes: Value = serde_json::from_str(&body_string(response).await).unwrap();
    let tables = codes.as_array().unwrap();
    assert_eq!(tables.len(), 12);
    let weather = tables.iter().find(|t| t["column"] == "WEATHR_IM").unwrap();
    let first = &weather["entries"][0];
    assert_eq!(first["code"], 1);
    assert_eq!(first["label"], "Clear");

    let response = app()
        .oneshot(Request::get("/api/v1/model").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let meta: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(meta["format"], "json_pipeline");
    assert_eq!(meta["sha256"].as_str().unwrap().len(), 64);
    assert_eq!(meta["stages"], json!(["preprocess", "model"]));
}
