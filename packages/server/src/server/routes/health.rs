use axum::Json;

use super::MessageResponse;

pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("ok"))
}
