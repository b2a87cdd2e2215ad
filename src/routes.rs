mod attempts;
mod tasks;
mod topics;

pub use attempts::{get_attempt_handler, get_my_attempts_handler, get_my_task_attempts_handler};
pub use tasks::{SubmitRequest, get_task_handler, submit_handler};
pub use topics::{get_topic_handler, get_topic_tasks_handler, get_topics_handler};

use std::future::{Ready, ready};

use actix_web::dev::Payload;
use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{FromRequest, HttpRequest, ResponseError, web};

use crate::error::ApiError;

/// Header carrying the id of the already authenticated user
pub const USER_HEADER: &str = "X-User-Id";

/// The user on whose behalf a request is made
///
/// Session handling lives in front of this service; by the time a request
/// arrives here the caller's id is in [`USER_HEADER`].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: u32,
}

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let id = req
            .headers()
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u32>().ok());

        ready(id.map(|id| CurrentUser { id }).ok_or(ApiError::Unauthorized))
    }
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response =
        ApiError::InvalidArgument(format!("Malformed request body: {err}")).error_response();
    InternalError::from_response(err, response).into()
}

/// Registers every endpoint together with the shared JSON settings
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(get_topics_handler)
        .service(get_topic_handler)
        .service(get_topic_tasks_handler)
        .service(get_task_handler)
        .service(submit_handler)
        .service(get_my_attempts_handler)
        .service(get_my_task_attempts_handler)
        .service(get_attempt_handler);
}
