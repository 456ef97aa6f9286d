use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{SharedScheduler, UserQuery};
use crate::error::Result;
use crate::models::{NewUser, User, UserUpdate};

pub fn routes(scheduler: SharedScheduler) -> Router {
    Router::new()
        .route("/users", post(register_user))
        .route("/user", get(get_user).put(update_user))
        .with_state(scheduler)
}

async fn register_user(
    State(scheduler): State<SharedScheduler>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    let user = scheduler.register_user(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(scheduler): State<SharedScheduler>,
    Query(params): Query<UserQuery>,
) -> Result<Json<User>> {
    Ok(Json(scheduler.get_user(params.user_id).await?))
}

async fn update_user(
    State(scheduler): State<SharedScheduler>,
    Query(params): Query<UserQuery>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<User>> {
    let today = chrono::Utc::now().naive_utc().date();
    Ok(Json(scheduler.update_user(params.user_id, body, today).await?))
}
