use std::sync::Arc;

use axum::{routing::get, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::cycle::scheduler::CycleScheduler;
use crate::error::{CycleError, Result};

pub mod cycle;
pub mod period;
pub mod symptoms;
pub mod users;

pub type SharedScheduler = Arc<CycleScheduler>;

/// Identity of the caller, as established by the upstream auth layer.
#[derive(Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

pub fn router(scheduler: SharedScheduler) -> Router {
    Router::new()
        .merge(users::routes(scheduler.clone()))
        .merge(cycle::routes(scheduler.clone()))
        .merge(period::routes(scheduler.clone()))
        .merge(symptoms::routes(scheduler))
        .route("/health", get(|| async { "✅ Backend up" }))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        CycleError::InvalidInput("Invalid date format (expected YYYY-MM-DD)".into())
    })
}
