//! HTTP routes.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::header::{self, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use ratewatch_common::{CurrencyId, RejectionReason};
use ratewatch_fx::{PairRegistration, RateSubmission};

use crate::envelope::{ApiError, ApiResponse, JsonBody, PageRequest, Params};
use crate::state::AppState;

/// Header echoing the id assigned to each request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/currencies/", post(register_pair).fallback(method_not_allowed))
        .route("/currencies", delete(delete_pair).fallback(method_not_allowed))
        .route("/currencies/list/", get(list_pairs).fallback(method_not_allowed))
        .route("/currencies/list", get(daily_snapshot).fallback(method_not_allowed))
        .route("/currencies/rates/", post(ingest_rate).fallback(method_not_allowed))
        .route(
            "/currencies/rates/trends",
            get(rate_trends).fallback(method_not_allowed),
        )
        .route("/health", get(health).fallback(method_not_allowed))
        .route("/metrics", get(metrics).fallback(method_not_allowed))
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let started = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let status = response.status();

    state.metrics.request_completed(status.as_u16());
    span.in_scope(|| {
        info!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
    });

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn register_pair(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<PairRegistration>,
) -> Result<ApiResponse, ApiError> {
    let pair = state.service.registry().register(&body).await?;
    state.metrics.pair_registered();

    ApiResponse::new(StatusCode::CREATED).with_fields(&pair)
}

async fn delete_pair(State(state): State<AppState>, params: Params) -> Result<ApiResponse, ApiError> {
    let raw = params
        .get("currency_id")
        .ok_or_else(|| ApiError::bad_request(RejectionReason::required("currency_id")))?;
    let currency_id: CurrencyId = raw.parse().map_err(|_| {
        ApiError::bad_request(RejectionReason::with_field(
            "INVALID_INTEGER",
            "A valid integer is required.",
            "currency_id",
        ))
    })?;

    let pair = state.service.registry().delete(currency_id).await?;
    state.metrics.pair_deleted();

    ApiResponse::new(StatusCode::NO_CONTENT).with_fields(&pair)
}

async fn list_pairs(State(state): State<AppState>, params: Params) -> Result<ApiResponse, ApiError> {
    let page = PageRequest::from_params(&params, &state.pagination)?;
    let pairs = state.service.registry().list().await?;

    ApiResponse::ok().with_list("currencies", pairs, page)
}

async fn daily_snapshot(State(state): State<AppState>, params: Params) -> Result<ApiResponse, ApiError> {
    let snapshot = state
        .service
        .aggregator()
        .daily_snapshot(params.get("date"))
        .await?;
    state.metrics.snapshot_served();

    ApiResponse::ok()
        .with("date", snapshot.date)?
        .with("rows", snapshot.rows)
}

async fn ingest_rate(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RateSubmission>,
) -> Result<ApiResponse, ApiError> {
    let observation = state.service.ingestor().ingest(&body).await?;
    state.metrics.rate_ingested();

    ApiResponse::new(StatusCode::CREATED).with_fields(&observation)
}

async fn rate_trends(State(state): State<AppState>, params: Params) -> Result<ApiResponse, ApiError> {
    let page = PageRequest::from_params(&params, &state.pagination)?;
    let trend = state
        .service
        .aggregator()
        .trend_statistics(params.get("domain"), params.get("codomain"))
        .await?;
    state.metrics.trend_queried();

    ApiResponse::ok()
        .with("domain", &trend.pair.domain)?
        .with("codomain", &trend.pair.codomain)?
        .with("average", trend.average)?
        .with("variance", trend.range)?
        .with_list("rates", trend.rates, page)
}

async fn health(State(state): State<AppState>) -> Result<ApiResponse, ApiError> {
    state.service.health_check().await.map_err(|e| {
        warn!(error = %e, "Health check failed");
        ApiError::Unavailable
    })?;
    Ok(ApiResponse::ok())
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use ratewatch_common::FixedClock;
    use ratewatch_store::InMemoryRateStore;

    use crate::config::ServerConfig;

    fn app_on(today: NaiveDate) -> Router {
        let state = AppState::with_clock(
            Arc::new(InMemoryRateStore::new()),
            Arc::new(FixedClock(today)),
            &ServerConfig::default(),
        );
        router(state)
    }

    fn app() -> Router {
        app_on(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = http::Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn post_rate(app: &Router, domain: &str, codomain: &str, date: &str, rate: f64) -> (StatusCode, Value) {
        send(
            app,
            Method::POST,
            "/currencies/rates/",
            Some(json!({"domain": domain, "codomain": codomain, "date": date, "rate": rate})),
        )
        .await
    }

    fn assert_close(value: &Value, expected: f64) {
        let actual = value.as_f64().expect("number");
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[tokio::test]
    async fn test_register_pair() {
        let app = app();

        let (status, body) = send(
            &app,
            Method::POST,
            "/currencies/",
            Some(json!({"domain": "USD", "codomain": "EUR"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], 201);
        assert_eq!(body["message"], "Created");
        assert_eq!(body["currency_id"], 1);
        assert_eq!(body["domain"], "USD");
        assert_eq!(body["codomain"], "EUR");
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_bad_request() {
        let app = app();
        let pair = json!({"domain": "USD", "codomain": "EUR"});

        send(&app, Method::POST, "/currencies/", Some(pair.clone())).await;
        let (status, body) = send(&app, Method::POST, "/currencies/", Some(pair)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Bad Request");
        assert_eq!(body["details"][0]["code"], "CONFLICT");

        let (_, list) = send(&app, Method::GET, "/currencies/list/", None).await;
        assert_eq!(list["currencies"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_codes_and_bodies() {
        let app = app();

        let (status, body) = send(
            &app,
            Method::POST,
            "/currencies/",
            Some(json!({"domain": "DOLLAR", "codomain": " "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
        assert_eq!(body["details"][0]["field"], "domain");

        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/currencies/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_usd_eur_trend() {
        let app = app();

        let (status, first) = post_rate(&app, "USD", "EUR", "2024-01-01", 0.90).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["date"], "2024-01-01");

        let (_, second) = post_rate(&app, "USD", "EUR", "2024-01-01", 0.92).await;
        assert_eq!(second["currency_rate_id"], first["currency_rate_id"]);
        assert_close(&second["rate"], 0.92);

        post_rate(&app, "USD", "EUR", "2024-01-03", 0.88).await;

        let (status, trend) = send(
            &app,
            Method::GET,
            "/currencies/rates/trends?domain=USD&codomain=EUR",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(trend["domain"], "USD");
        assert_eq!(trend["codomain"], "EUR");
        assert_close(&trend["average"], 0.90);
        assert_close(&trend["variance"], 0.04);
        assert_eq!(trend["rates"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_rejects_invalid_submission() {
        let app = app();

        let (status, body) = send(
            &app,
            Method::POST,
            "/currencies/rates/",
            Some(json!({"domain": "USD", "codomain": "EUR", "date": "2024-02-30", "rate": 0.9})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "date");

        let (_, list) = send(&app, Method::GET, "/currencies/list/", None).await;
        assert!(list["currencies"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trend_for_unknown_pair_is_not_found() {
        let app = app();

        let (status, body) = send(
            &app,
            Method::GET,
            "/currencies/rates/trends?domain=USD&codomain=EUR",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
        assert_eq!(body["message"], "Not Found");
        assert_eq!(body["details"][0]["code"], "NOT_FOUND");

        let (status, _) = send(&app, Method::GET, "/currencies/rates/trends?domain=USD", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_pair_cascades() {
        let app = app();
        let (_, rate) = post_rate(&app, "USD", "EUR", "2024-01-03", 0.88).await;
        let id = rate["currency_id"].as_i64().unwrap();

        let (status, body) = send(&app, Method::DELETE, &format!("/currencies?currency_id={id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        if !body.is_null() {
            assert_eq!(body["currency_id"], id);
        }

        let (status, _) = send(
            &app,
            Method::GET,
            "/currencies/rates/trends?domain=USD&codomain=EUR",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, &format!("/currencies?currency_id={id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_requires_integer_id() {
        let app = app();

        let (status, body) = send(&app, Method::DELETE, "/currencies", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"][0]["field"], "currency_id");

        let (status, _) = send(&app, Method::DELETE, "/currencies?currency_id=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_pairs_in_order_and_paginated() {
        let app = app();
        for (domain, codomain) in [("USD", "EUR"), ("USD", "GBP"), ("EUR", "JPY")] {
            send(
                &app,
                Method::POST,
                "/currencies/",
                Some(json!({"domain": domain, "codomain": codomain})),
            )
            .await;
        }

        let (status, body) = send(&app, Method::GET, "/currencies/list/", None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body["currencies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["currency_id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let (status, page) = send(&app, Method::GET, "/currencies/list/?page=2&page_size=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 3);
        assert_eq!(page["previous"], 1);
        assert!(page["next"].is_null());
        assert_eq!(page["currencies"][0]["codomain"], "JPY");

        let (status, body) = send(&app, Method::GET, "/currencies/list/?page=3&page_size=2", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["details"][0]["message"], "Invalid page.");
    }

    #[tokio::test]
    async fn test_daily_snapshot() {
        let app = app();
        post_rate(&app, "USD", "EUR", "2024-01-02", 0.90).await;
        post_rate(&app, "USD", "EUR", "2024-01-03", 0.94).await;
        post_rate(&app, "USD", "JPY", "2024-01-03", 140.0).await;

        let (status, body) = send(&app, Method::GET, "/currencies/list?date=2024-01-02", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["date"], "2024-01-02");
        let rows = body["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["codomain"], "EUR");
        assert_close(&rows[0]["rate"], 0.94);
        assert_close(&rows[0]["average"], 0.92);
    }

    #[tokio::test]
    async fn test_daily_snapshot_rejects_bad_dates() {
        let app = app();

        for uri in ["/currencies/list", "/currencies/list?date=02-01-2024", "/currencies/list?date=2024-02-30"] {
            let (status, body) = send(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["message"], "Bad Request");
        }
    }

    #[tokio::test]
    async fn test_unsupported_method_and_route() {
        let app = app();

        let (status, body) = send(&app, Method::GET, "/currencies/", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["status"], 405);
        assert_eq!(body["message"], "Method Not Allowed");
        assert_eq!(body["details"][0]["message"], "Method \"GET\" not allowed.");

        let (status, body) = send(&app, Method::GET, "/exchange", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Not Found");
    }

    #[tokio::test]
    async fn test_health_metrics_and_request_id() {
        let app = app();
        post_rate(&app, "USD", "EUR", "2024-01-03", 0.88).await;

        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OK");

        let request = http::Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("ratewatch_rates_ingested_total 1"));
        assert!(text.contains("ratewatch_requests_total 2"));
    }
}
