//! Error taxonomy shared across the crate.
//!
//! Every variant corresponds to one row of the error-kind table in the
//! design: validation/decode errors are caught at the HTTP boundary and
//! rendered as structured JSON; engine and optimizer errors raised inside
//! a background worker are stored on the session instead of propagated.

use serde::Serialize;

/// One "kind" of failure the system can report, independent of where it
/// is surfaced (HTTP response, session `failed` state, or log line).
#[derive(Debug, Clone, thiserror::Error)]
pub enum OptimizerError {
    #[error("request body malformed or out of range: {reason}")]
    Validation { reason: String, action: Option<String> },

    #[error("build uses features this optimizer cannot reason about: {reason}")]
    UnsupportedBuild { reason: String },

    #[error("build code failed to decode: {reason}")]
    BuildDecode { reason: String },

    #[error("calculation oracle failed to initialize: {reason}")]
    EngineInit { reason: String },

    #[error("engine rejected build as invalid: {reason}")]
    Calculation { reason: String },

    #[error("engine crashed during calculation: {reason}")]
    EngineRuntime { reason: String },

    #[error("optimizer busy: request gate acquisition timed out")]
    OptimizerBusy,

    #[error("unknown session id")]
    SessionNotFound,

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl OptimizerError {
    /// The `error_type` PascalCase tag used in the JSON error shape.
    pub fn error_type(&self) -> &'static str {
        match self {
            OptimizerError::Validation { .. } => "ValidationError",
            OptimizerError::UnsupportedBuild { .. } => "UnsupportedBuildError",
            OptimizerError::BuildDecode { .. } => "BuildDecodeError",
            OptimizerError::EngineInit { .. } => "EngineInitError",
            OptimizerError::Calculation { .. } => "CalculationError",
            OptimizerError::EngineRuntime { .. } => "EngineRuntimeError",
            OptimizerError::OptimizerBusy => "OptimizerBusy",
            OptimizerError::SessionNotFound => "SessionNotFound",
            OptimizerError::Internal { .. } => "InternalError",
        }
    }

    /// Suggested next step shown to the end user, per spec ("action" field).
    pub fn action(&self) -> Option<String> {
        match self {
            OptimizerError::Validation { action, .. } => action.clone(),
            OptimizerError::UnsupportedBuild { .. } => {
                Some("remove unsupported items (e.g. cluster jewels) and retry".into())
            }
            OptimizerError::BuildDecode { .. } => {
                Some("verify the code imports into the reference tool".into())
            }
            OptimizerError::OptimizerBusy => Some("try again in a moment".into()),
            OptimizerError::EngineRuntime { .. } => Some("try again".into()),
            _ => None,
        }
    }

    pub fn http_status(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            OptimizerError::Validation { .. }
            | OptimizerError::UnsupportedBuild { .. }
            | OptimizerError::BuildDecode { .. } => StatusCode::BAD_REQUEST,
            OptimizerError::SessionNotFound => StatusCode::NOT_FOUND,
            OptimizerError::EngineInit { .. }
            | OptimizerError::Calculation { .. }
            | OptimizerError::EngineRuntime { .. }
            | OptimizerError::OptimizerBusy
            | OptimizerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire shape for `{error_type, reason, details?, action?}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error_type: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl From<&OptimizerError> for ErrorBody {
    fn from(err: &OptimizerError) -> Self {
        ErrorBody {
            error_type: err.error_type(),
            reason: err.to_string(),
            details: None,
            action: err.action(),
        }
    }
}

impl actix_web::ResponseError for OptimizerError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        actix_web::HttpResponse::build(self.status_code()).json(ErrorBody::from(self))
    }
}
