use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;

use super::{SharedScheduler, UserQuery};
use crate::error::Result;
use crate::models::PeriodRun;

#[derive(Serialize)]
pub struct PeriodDates {
    pub period_dates: Vec<NaiveDate>,
}

pub fn routes(scheduler: SharedScheduler) -> Router {
    Router::new()
        .route("/period-dates", get(get_period_dates))
        .route("/period-history", get(get_period_history))
        .with_state(scheduler)
}

async fn get_period_dates(
    State(scheduler): State<SharedScheduler>,
    Query(params): Query<UserQuery>,
) -> Result<Json<PeriodDates>> {
    let period_dates = scheduler.period_dates(params.user_id).await?;
    Ok(Json(PeriodDates { period_dates }))
}

async fn get_period_history(
    State(scheduler): State<SharedScheduler>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<PeriodRun>>> {
    Ok(Json(scheduler.period_history(params.user_id).await?))
}
