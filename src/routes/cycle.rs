use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::{parse_date, SharedScheduler, UserQuery};
use crate::error::Result;
use crate::models::{
    Cycle, CycleStatus, LoggedDay, PeriodLogDeleted, PeriodLogged, PhaseInterval,
};

#[derive(Serialize)]
pub struct LogPeriodResponse {
    #[serde(flatten)]
    pub logged: PeriodLogged,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct DeletePeriodResponse {
    #[serde(flatten)]
    pub deleted: PeriodLogDeleted,
    pub message: &'static str,
}

pub fn routes(scheduler: SharedScheduler) -> Router {
    Router::new()
        .route("/log-period/:date", post(log_period).delete(delete_period_log))
        .route("/cycle-data", get(get_cycle_status))
        .route("/cycles", get(list_cycles))
        .route("/cycles/:cycle_id/phases", get(list_phases))
        .route("/cycles/:cycle_id/logs", get(list_cycle_logs))
        .with_state(scheduler)
}

async fn log_period(
    State(scheduler): State<SharedScheduler>,
    Path(date): Path<String>,
    Query(params): Query<UserQuery>,
) -> Result<(StatusCode, Json<LogPeriodResponse>)> {
    let date = parse_date(&date)?;
    let logged = scheduler.log_period(params.user_id, date).await?;

    let message = if logged.cycle_is_new {
        "New cycle created and period logged successfully"
    } else {
        "Period logged successfully"
    };
    Ok((StatusCode::CREATED, Json(LogPeriodResponse { logged, message })))
}

async fn delete_period_log(
    State(scheduler): State<SharedScheduler>,
    Path(date): Path<String>,
    Query(params): Query<UserQuery>,
) -> Result<Json<DeletePeriodResponse>> {
    let date = parse_date(&date)?;
    let deleted = scheduler.delete_period_log(params.user_id, date).await?;

    let message = if deleted.cycle_deleted {
        "Cycle and period log deleted successfully"
    } else {
        "Period log deleted successfully"
    };
    Ok(Json(DeletePeriodResponse { deleted, message }))
}

async fn get_cycle_status(
    State(scheduler): State<SharedScheduler>,
    Query(params): Query<UserQuery>,
) -> Result<Json<CycleStatus>> {
    let today = chrono::Utc::now().naive_utc().date();
    Ok(Json(scheduler.current_status(params.user_id, today).await?))
}

async fn list_cycles(
    State(scheduler): State<SharedScheduler>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<Cycle>>> {
    Ok(Json(scheduler.cycles(params.user_id).await?))
}

async fn list_phases(
    State(scheduler): State<SharedScheduler>,
    Path(cycle_id): Path<Uuid>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<PhaseInterval>>> {
    Ok(Json(scheduler.phase_intervals(params.user_id, cycle_id).await?))
}

async fn list_cycle_logs(
    State(scheduler): State<SharedScheduler>,
    Path(cycle_id): Path<Uuid>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<LoggedDay>>> {
    Ok(Json(scheduler.logged_days(params.user_id, Some(cycle_id)).await?))
}
