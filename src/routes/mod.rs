mod health;
mod predict;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(health::root_status))
        .route("/health", get(health::healthcheck))
        .route("/predict", post(predict::predict))
}
