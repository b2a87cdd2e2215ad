use actix_web::{HttpResponse, get, web};
use sqlx::sqlite::SqlitePool;

use crate::database as db;
use crate::error::ApiError;

#[get("/topics")]
pub async fn get_topics_handler(pool: web::Data<SqlitePool>) -> Result<HttpResponse, ApiError> {
    let topics = db::list_topics(&pool).await?;
    Ok(HttpResponse::Ok().json(topics))
}

#[get(r"/topics/{id:\d+}")]
pub async fn get_topic_handler(
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner().0;

    match db::fetch_topic(id, &pool).await? {
        Some(topic) => Ok(HttpResponse::Ok().json(topic)),
        None => Err(ApiError::NotFound(format!("Topic {id} not found."))),
    }
}

/// Tasks of one topic without their test data
#[get(r"/topics/{id:\d+}/tasks")]
pub async fn get_topic_tasks_handler(
    pool: web::Data<SqlitePool>,
    path: web::Path<(u32,)>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner().0;

    if db::fetch_topic(id, &pool).await?.is_none() {
        log::info!("Got nothing with topic id {id} from database");
        return Err(ApiError::NotFound(format!("Topic {id} not found.")));
    }
    let tasks = db::list_topic_tasks(id, &pool).await?;
    Ok(HttpResponse::Ok().json(tasks))
}
