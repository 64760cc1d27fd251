use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::db;
use crate::models::{Subject, SubjectAttendance, Task, TaskFilter};
use crate::web::error::AppResult;
use crate::web::extract::{ApiUser, CurrentUser};
use crate::web::forms::StatusQuery;
use crate::web::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/subjects", get(subjects))
        .route("/tasks", get(tasks))
        .route("/attendance", get(attendance))
}

async fn me(ApiUser(user): ApiUser) -> Json<CurrentUser> {
    Json(user)
}

async fn subjects(State(state): State<AppState>, ApiUser(user): ApiUser) -> AppResult<Json<Vec<Subject>>> {
    Ok(Json(db::list_subjects(&state.pool, user.id).await?))
}

async fn tasks(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<Vec<Task>>> {
    let filter = TaskFilter::parse_lenient(query.status.as_deref());
    Ok(Json(db::list_tasks(&state.pool, user.id, filter).await?))
}

async fn attendance(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
) -> AppResult<Json<Vec<SubjectAttendance>>> {
    Ok(Json(db::attendance_summary(&state.pool, user.id).await?))
}
