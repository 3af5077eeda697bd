//! Endpoint bodies for the six routes in [`super::configure`]. Each
//! handler validates its own input and returns `Result<_, OptimizerError>`
//! so `actix_web::ResponseError` renders the shared JSON error shape —
//! there is no per-route error formatting to keep in sync.

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::climb::{Metric, OptimizationConfig};
use crate::codec;
use crate::error::OptimizerError;
use crate::session::SessionStatus;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub pob_code: String,
    pub metric: String,
    pub unallocated_points: u32,
    #[serde(default)]
    pub respec_points: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub session_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub pob_code: String,
}

fn parse_metric(raw: &str) -> Result<Metric, OptimizerError> {
    match raw {
        "dps" => Ok(Metric::Dps),
        "ehp" => Ok(Metric::Ehp),
        "balanced" => Ok(Metric::Balanced),
        other => Err(OptimizerError::Validation {
            reason: format!("unknown metric \"{other}\", expected one of dps, ehp, balanced"),
            action: Some("set metric to one of: dps, ehp, balanced".into()),
        }),
    }
}

pub async fn optimize(state: web::Data<AppState>, body: web::Json<OptimizeRequest>) -> Result<impl Responder, OptimizerError> {
    let body = body.into_inner();
    let metric = parse_metric(&body.metric)?;
    let decoded = codec::decode_build_code(&body.pob_code)?;

    let config = OptimizationConfig {
        metric,
        free_budget: body.unallocated_points,
        respec_budget: body.respec_points,
        max_iterations: state.config.max_iterations,
        max_wall_time: state.config.max_wall_time(),
        patience: state.config.patience,
        min_relative_improvement: state.config.min_relative_improvement,
    };

    let session_id = state.registry.submit(decoded.raw_xml, decoded.build, config).await?;
    Ok(HttpResponse::Ok().json(OptimizeResponse { session_id, status: "pending" }))
}

pub async fn progress(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<impl Responder, OptimizerError> {
    let id = path.into_inner();
    if state.registry.get(id).await.is_none() {
        return Err(OptimizerError::SessionNotFound);
    }
    let queue = state.registry.take_progress_queue(id).await.ok_or_else(|| OptimizerError::Validation {
        reason: "a progress stream is already attached to this session".into(),
        action: Some("poll /result/<id> instead".into()),
    })?;

    let stream = crate::progress::into_sse_stream(queue);
    Ok(HttpResponse::Ok().content_type("text/event-stream").streaming(stream))
}

pub async fn result(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<impl Responder, OptimizerError> {
    let id = path.into_inner();
    let session = state.registry.get(id).await.ok_or(OptimizerError::SessionNotFound)?;
    Ok(HttpResponse::Ok().json(session.poll().await))
}

pub async fn cancel(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<impl Responder, OptimizerError> {
    let id = path.into_inner();
    state.registry.cancel(id).await?;
    Ok(HttpResponse::Ok().json(CancelResponse { success: true }))
}

pub async fn export(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<impl Responder, OptimizerError> {
    let id = path.into_inner();
    let session = state.registry.get(id).await.ok_or(OptimizerError::SessionNotFound)?;
    if session.status().await != SessionStatus::Completed {
        return Err(OptimizerError::Validation {
            reason: "session has not completed; nothing to export yet".into(),
            action: Some("poll /result/<id> until status is \"completed\"".into()),
        });
    }
    let pob_code = codec::encode_build_code(session.raw_xml(), &session.export_nodes().await)?;
    Ok(HttpResponse::Ok().json(ExportResponse { pob_code }))
}

pub async fn index() -> impl Responder {
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(include_str!("../../static/index.html"))
}
