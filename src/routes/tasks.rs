use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use super::CurrentUser;
use crate::database as db;
use crate::error::ApiError;
use crate::grading::SubmissionGate;

#[derive(Serialize, Deserialize, Debug)]
pub struct SubmitRequest {
    pub task_id: u32,
    pub code: String,
}

#[get("/tasks/{task_id}")]
pub async fn get_task_handler(
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner().0;

    match db::fetch_task_view(task_id, &pool).await? {
        Some(task) => Ok(HttpResponse::Ok().json(task)),
        None => {
            log::info!("Got nothing with task id {task_id} from database");
            Err(ApiError::NotFound(format!("Task {task_id} not found.")))
        }
    }
}

/// Grades the submitted code and answers once the attempt is recorded
#[post("/tasks/{task_id}/submit")]
pub async fn submit_handler(
    gate: web::Data<SubmissionGate>,
    user: CurrentUser,
    path: web::Path<(u32,)>,
    body: web::Json<SubmitRequest>,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner().0;

    if body.task_id != task_id {
        return Err(ApiError::InvalidArgument(format!(
            "Task id {} in the body does not match task {task_id} in the path.",
            body.task_id
        )));
    }
    if body.code.trim().is_empty() {
        return Err(ApiError::InvalidArgument("code must not be empty".to_string()));
    }

    let result = gate.submit(user.id, task_id, &body.code).await?;
    log::info!(
        "Attempt {} of user {} on task {task_id}: {}",
        result.attempt_id,
        user.id,
        result.message
    );
    Ok(HttpResponse::Ok().json(result))
}
