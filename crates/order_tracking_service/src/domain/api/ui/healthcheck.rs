use actix_web::{
    get,
    web::{Data, Json},
};
use tracing::debug;

use crate::{common::types::*, environment::AppState, tools::error::AppError};

#[get("/healthcheck")]
pub async fn health_check(data: Data<AppState>) -> Result<Json<ResponseData>, AppError> {
    let active_sessions = data.hub.session_count().await;
    debug!(tag = "[Health Check]", active_sessions);

    Ok(Json(ResponseData {
        result: "Service Is Up".to_string(),
    }))
}
