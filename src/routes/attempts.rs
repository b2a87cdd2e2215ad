use actix_web::{HttpResponse, get, web};
use sqlx::sqlite::SqlitePool;

use super::CurrentUser;
use crate::database as db;
use crate::error::ApiError;

#[get("/attempts/my")]
pub async fn get_my_attempts_handler(
    pool: web::Data<SqlitePool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let attempts = db::list_attempts(user.id, None, &pool).await?;
    log::debug!("Got {} attempts of user {}", attempts.len(), user.id);
    Ok(HttpResponse::Ok().json(attempts))
}

#[get("/attempts/my/task/{task_id}")]
pub async fn get_my_task_attempts_handler(
    pool: web::Data<SqlitePool>,
    user: CurrentUser,
    path: web::Path<(u32,)>,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner().0;
    let attempts = db::list_attempts(user.id, Some(task_id), &pool).await?;
    Ok(HttpResponse::Ok().json(attempts))
}

/// Attempts of other users are reported as missing
#[get(r"/attempts/{id:\d+}")]
pub async fn get_attempt_handler(
    pool: web::Data<SqlitePool>,
    user: CurrentUser,
    path: web::Path<(u32,)>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner().0;

    match db::fetch_attempt(id, &pool).await? {
        Some(attempt) if attempt.user_id == user.id => Ok(HttpResponse::Ok().json(attempt)),
        _ => Err(ApiError::NotFound(format!("Attempt {id} not found."))),
    }
}
