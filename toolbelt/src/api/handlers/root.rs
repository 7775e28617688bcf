use axum::Json;

use crate::api::models::responses::WelcomeResponse;

pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to Toolbelt API".to_string(),
    })
}
