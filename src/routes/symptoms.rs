use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use super::{parse_date, SharedScheduler, UserQuery};
use crate::error::Result;
use crate::models::{LoggedDay, NewSymptom, Symptom, SymptomSelection};

pub fn routes(scheduler: SharedScheduler) -> Router {
    Router::new()
        .route("/symptoms", get(list_symptoms).post(create_symptom))
        .route("/log-period/:date/symptoms", put(set_log_symptoms))
        .route("/logs", get(list_logs))
        .with_state(scheduler)
}

async fn list_symptoms(State(scheduler): State<SharedScheduler>) -> Result<Json<Vec<Symptom>>> {
    Ok(Json(scheduler.symptoms().await?))
}

async fn create_symptom(
    State(scheduler): State<SharedScheduler>,
    Json(body): Json<NewSymptom>,
) -> Result<(StatusCode, Json<Symptom>)> {
    let symptom = scheduler.create_symptom(&body.name).await?;
    Ok((StatusCode::CREATED, Json(symptom)))
}

async fn set_log_symptoms(
    State(scheduler): State<SharedScheduler>,
    Path(date): Path<String>,
    Query(params): Query<UserQuery>,
    Json(body): Json<SymptomSelection>,
) -> Result<Json<LoggedDay>> {
    let date = parse_date(&date)?;
    let day = scheduler
        .set_log_symptoms(params.user_id, date, &body.symptom_ids)
        .await?;
    Ok(Json(day))
}

async fn list_logs(
    State(scheduler): State<SharedScheduler>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<LoggedDay>>> {
    Ok(Json(scheduler.logged_days(params.user_id, None).await?))
}
