//! Route handlers for the vigil API

use super::{ApiError, AppState};
use crate::models::{EventQuery, NewEvent};
use crate::net::CidrRange;
use crate::persistence::StoreError;
use actix_web::{delete, get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::IpAddr;

/// Register all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(add_ip_range)
        .service(get_ip_ranges)
        .service(delete_ip_range)
        .service(process_events)
        .service(get_suspicious_events);
}

/// Request/response body for an IP range in CIDR notation
#[derive(Debug, Serialize, Deserialize)]
pub struct IpRangePayload {
    pub cidr: String,
}

/// Per-event response for the event-processing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub user: String,
    pub ip: IpAddr,
    pub is_suspicious: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteRangeParams {
    cidr: String,
}

#[derive(Debug, Deserialize)]
struct SuspiciousEventsParams {
    limit: Option<i64>,
    offset: Option<i64>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

fn parse_cidr(text: &str) -> Result<CidrRange, ApiError> {
    text.parse::<CidrRange>()
        .map_err(|e| ApiError::Validation(e.to_string()))
}

/// Add a new suspicious IP range
#[post("/ip-ranges")]
async fn add_ip_range(
    state: web::Data<AppState>,
    payload: web::Json<IpRangePayload>,
) -> Result<HttpResponse, ApiError> {
    let range = parse_cidr(&payload.cidr)?;

    let store = state.store.clone();
    web::block(move || store.add_range(&range)).await??;

    Ok(HttpResponse::Created().json(json!({ "message": "IP range added" })))
}

/// Retrieve all suspicious IP ranges in normalized form
#[get("/ip-ranges")]
async fn get_ip_ranges(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let store = state.store.clone();
    let ranges = web::block(move || store.list_ranges()).await??;

    let body: Vec<IpRangePayload> = ranges
        .into_iter()
        .map(|range| IpRangePayload {
            cidr: range.to_string(),
        })
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

/// Delete a suspicious IP range
#[delete("/ip-ranges")]
async fn delete_ip_range(
    state: web::Data<AppState>,
    params: web::Query<DeleteRangeParams>,
) -> Result<HttpResponse, ApiError> {
    let range = parse_cidr(&params.cidr)?;

    let store = state.store.clone();
    web::block(move || store.delete_range(&range)).await??;

    Ok(HttpResponse::Ok().json(json!({ "message": "IP range deleted" })))
}

/// Process a list of events, marking each as suspicious if applicable
///
/// Events are classified independently and sequentially in submission
/// order, so an event that flags a user affects the later events in the
/// same batch.
#[post("/process-event")]
async fn process_events(
    state: web::Data<AppState>,
    payload: web::Json<Vec<NewEvent>>,
) -> Result<HttpResponse, ApiError> {
    let engine = state.engine.clone();
    let events = payload.into_inner();

    let responses = web::block(move || -> Result<Vec<EventResponse>, StoreError> {
        let mut responses = Vec::with_capacity(events.len());
        for event in &events {
            let outcome = engine.process_event(event)?;
            responses.push(EventResponse {
                user: event.username.clone(),
                ip: event.source_ip,
                is_suspicious: outcome.is_suspicious,
            });
        }
        Ok(responses)
    })
    .await??;

    Ok(HttpResponse::Ok().json(responses))
}

/// Retrieve a paginated list of suspicious events, newest first
#[get("/suspicious-events")]
async fn get_suspicious_events(
    state: web::Data<AppState>,
    params: web::Query<SuspiciousEventsParams>,
) -> Result<HttpResponse, ApiError> {
    let limit = params.limit.unwrap_or(EventQuery::DEFAULT_LIMIT);
    if !(1..=EventQuery::MAX_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            EventQuery::MAX_LIMIT
        )));
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::Validation(
            "offset must be non-negative".to_string(),
        ));
    }

    let query = EventQuery {
        start: params.start_date,
        end: params.end_date,
        limit,
        offset,
    };

    let store = state.store.clone();
    let events = web::block(move || store.suspicious_events(&query)).await??;

    Ok(HttpResponse::Ok().json(events))
}
