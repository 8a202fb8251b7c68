//! Birth date and life statistics endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::life::{parse_birth_date, BirthDateError, LifeStats, TimeLived};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthDateBody {
    pub birth_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirthDateQuery {
    #[serde(default)]
    pub birth_date: Option<String>,
}

pub enum LifeApiError {
    NotSet,
    BirthDate(BirthDateError),
}

impl From<BirthDateError> for LifeApiError {
    fn from(err: BirthDateError) -> Self {
        LifeApiError::BirthDate(err)
    }
}

impl IntoResponse for LifeApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            LifeApiError::NotSet => (StatusCode::NOT_FOUND, "No birth date set".to_string()),
            LifeApiError::BirthDate(err @ BirthDateError::Invalid(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            LifeApiError::BirthDate(err @ BirthDateError::Storage(_)) => {
                error!("Birth date storage failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage unavailable".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub async fn get_birth_date(
    State(state): State<AppState>,
) -> Result<Json<BirthDateBody>, LifeApiError> {
    let date = state.birth_dates.load().await?;
    Ok(Json(BirthDateBody {
        birth_date: date.map(|d| d.format("%Y-%m-%d").to_string()),
    }))
}

pub async fn put_birth_date(
    State(state): State<AppState>,
    Json(body): Json<BirthDateBody>,
) -> Result<StatusCode, LifeApiError> {
    let raw = body.birth_date.unwrap_or_default();
    state.birth_dates.save(&raw).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The query's date if given, otherwise the stored one.
async fn resolve_birth_date(
    state: &AppState,
    query: BirthDateQuery,
) -> Result<NaiveDate, LifeApiError> {
    match query.birth_date.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => Ok(parse_birth_date(&raw)?),
        None => state.birth_dates.load().await?.ok_or(LifeApiError::NotSet),
    }
}

pub async fn life_stats(
    State(state): State<AppState>,
    Query(query): Query<BirthDateQuery>,
) -> Result<Json<LifeStats>, LifeApiError> {
    let birth = resolve_birth_date(&state, query).await?;
    Ok(Json(LifeStats::between(birth, Utc::now())))
}

pub async fn time_lived(
    State(state): State<AppState>,
    Query(query): Query<BirthDateQuery>,
) -> Result<Json<TimeLived>, LifeApiError> {
    let birth = resolve_birth_date(&state, query).await?;
    Ok(Json(TimeLived::between(birth, Utc::now())))
}

#[cfg(test)]
mod tests {
    use crate::engine::InMemoryStore;
    use crate::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        crate::app(AppState::new(reqwest::Client::new(), Arc::new(InMemoryStore::new())))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn put_birth_date(date: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri("/api/birth-date")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "birthDate": date }).to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_birth_date_round_trip() {
        let app = app();

        let response = app.clone().oneshot(get("/api/birth-date")).await.unwrap();
        assert_eq!(json_body(response).await, json!({ "birthDate": null }));

        let response = app.clone().oneshot(put_birth_date("1990-05-17")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get("/api/birth-date")).await.unwrap();
        assert_eq!(json_body(response).await, json!({ "birthDate": "1990-05-17" }));
    }

    #[tokio::test]
    async fn test_invalid_birth_date_is_rejected() {
        let response = app().oneshot(put_birth_date("yesterday")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_life_stats_without_birth_date_is_not_found() {
        let response = app().oneshot(get("/api/life-stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_life_stats_from_stored_date() {
        let app = app();
        app.clone().oneshot(put_birth_date("1990-05-17")).await.unwrap();

        let response = app.oneshot(get("/api/life-stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert!(body["heartbeats"].as_u64().unwrap() > 1_000_000_000);
        assert!(body["earthRevolutions"].as_u64().unwrap() >= 35);
    }

    #[tokio::test]
    async fn test_time_lived_from_query() {
        let response = app()
            .oneshot(get("/api/time-lived?birthDate=2000-01-01"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert!(body["months"].as_u64().unwrap() >= 300);
        assert!(body["hours"].as_u64().unwrap() < 24);
    }
}
