use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type Result<T, E = CycleError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("invalid cycle configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    /// A cycle exists without the interval its partition requires.
    #[error("inconsistent cycle state: {0}")]
    InconsistentState(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CycleError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidConfig(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InconsistentState(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_write(e: sqlx::Error, conflict: impl FnOnce(&str) -> String) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or_default();
                tracing::info!("🔒 Constraint violated: {}", constraint);
                return Self::Conflict(conflict(constraint));
            }
            tracing::error!("❌ DB write failed: {}", db_err.message());
            if let Some(code) = db_err.code() {
                tracing::info!("ℹ️ SQLSTATE code: {}", code);
            }
        } else {
            tracing::error!("❌ Unknown DB error: {}", e);
        }
        Self::Database(e)
    }
}

impl IntoResponse for CycleError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Database(e) => {
                tracing::error!("❌ DB error: {:?}", e);
                "DB error".to_string()
            }
            Self::InconsistentState(detail) => {
                tracing::error!("❌ Data integrity violation: {}", detail);
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
