use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct ApiStatus {
    message: String,
    status: String,
    model_loaded: bool,
}

#[derive(Serialize, Deserialize)]
pub struct HealthStatus {
    status: String,
    model_loaded: bool,
}

pub async fn root_status(State(state): State<SharedState>) -> Json<ApiStatus> {
    Json(ApiStatus {
        message: "DR Diagnosis API".into(),
        status: "online".into(),
        model_loaded: state.model.is_some(),
    })
}

pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".into(),
        model_loaded: state.model.is_some(),
    })
}
