//! Wire-stable error kinds shared by every port the core exposes.
//!
//! Generalized from `services::matching::types::MatchingError` in the
//! teacher repo, widened to the kinds the trading core as a whole needs
//! (LMSR insufficiency, broker/persistence failures) while keeping the
//! same "one flat enum, `thiserror`-derived, `IntoResponse`-able at the
//! edge" shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient liquidity for this order")]
    InsufficientLiquidity,

    #[error("lmsr liquidity parameter too small for this trade")]
    LmsrInsufficient,

    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("order already cancelled")]
    Cancelled,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            EngineError::LmsrInsufficient => "LMSR_INSUFFICIENT",
            EngineError::BrokerUnavailable(_) => "BROKER_UNAVAILABLE",
            EngineError::PersistenceFailed(_) => "PERSISTENCE_FAILED",
            EngineError::Cancelled => "CANCELLED",
            EngineError::Database(_) => "PERSISTENCE_FAILED",
            EngineError::Internal(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::InsufficientLiquidity | EngineError::LmsrInsufficient => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::BrokerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::PersistenceFailed(_) | EngineError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            EngineError::Cancelled => StatusCode::CONFLICT,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.kind(),
            message: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
