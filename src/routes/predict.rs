use crate::{
    diagnosis::Prediction,
    model::{InferenceError, Model},
    preprocess::{preprocess, DecodeError},
    server::SharedState,
};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("upload must contain an `image` file field")]
    MissingImageField,
    #[error("file must be an image")]
    InvalidMediaType,
    #[error("failed to read multipart upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("failed to decode image: {0}")]
    Decode(#[from] DecodeError),
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingImageField
            | PredictError::InvalidMediaType
            | PredictError::Multipart(_) => StatusCode::BAD_REQUEST,
            PredictError::Decode(_) | PredictError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (self.status_code(), format!("Error processing upload: {}", self)).into_response()
    }
}

#[instrument(skip(state, multipart))]
pub async fn predict(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<Prediction>, PredictError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let filename = field.file_name().unwrap_or("<unnamed>").to_string();

        if !content_type.starts_with("image/") {
            return Err(PredictError::InvalidMediaType);
        }

        tracing::info!("Processing upload: {}", filename);

        // Placeholder mode never reads the payload.
        let Some(model) = &state.model else {
            return Ok(Json(Prediction::placeholder()));
        };

        let image_data = field.bytes().await?;
        return Ok(Json(run_prediction(model.as_ref(), &image_data)?));
    }

    Err(PredictError::MissingImageField)
}

fn run_prediction(model: &dyn Model, image_data: &[u8]) -> Result<Prediction, PredictError> {
    let input = preprocess(image_data)?;
    let probabilities = model.infer(&input)?;

    Ok(Prediction::from_probabilities(probabilities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header, Request},
    };
    use image::{ImageBuffer, Rgb};
    use ndarray::{Array, Ix4};
    use std::{io::Cursor, sync::Arc};

    struct MockModel {
        probabilities: [f32; 2],
    }

    impl Model for MockModel {
        fn infer(&self, _input: &Array<f32, Ix4>) -> Result<[f32; 2], InferenceError> {
            Ok(self.probabilities)
        }
    }

    struct FailingModel;

    impl Model for FailingModel {
        fn infer(&self, _input: &Array<f32, Ix4>) -> Result<[f32; 2], InferenceError> {
            Err(InferenceError::OutputShape(0))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(64, 64, Rgb([40, 120, 200]));
        let mut image_data: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut image_data);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        image_data
    }

    async fn multipart_upload(field_name: &str, content_type: &str, payload: &[u8]) -> Multipart {
        let boundary = "predict-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"eye.png\"\r\n",
                field_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_placeholder_served_without_model_regardless_of_payload() {
        let state = SharedState { model: None };
        let multipart = multipart_upload("image", "image/png", b"not even an image").await;

        let response = predict(State(state), multipart).await.unwrap();

        assert_eq!(response.0.diagnosis, "DR");
        assert_eq!(response.0.probability_dr, 0.85);
        assert_eq!(response.0.probability_no_dr, 0.15);
        assert_eq!(response.0.class_predicted, 0);
        assert!(response.0.note.is_some());
    }

    #[tokio::test]
    async fn test_non_image_media_type_is_rejected() {
        let state = SharedState { model: None };
        let multipart = multipart_upload("image", "text/plain", b"hello").await;

        let error = predict(State(state), multipart).await.unwrap_err();

        assert!(matches!(error, PredictError::InvalidMediaType));
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_image_field_is_rejected() {
        let state = SharedState { model: None };
        let multipart = multipart_upload("document", "image/png", &png_bytes()).await;

        let error = predict(State(state), multipart).await.unwrap_err();

        assert!(matches!(error, PredictError::MissingImageField));
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dr_positive_prediction() {
        let state = SharedState {
            model: Some(Arc::new(MockModel {
                probabilities: [0.9, 0.1],
            })),
        };
        let multipart = multipart_upload("image", "image/png", &png_bytes()).await;

        let response = predict(State(state), multipart).await.unwrap();

        assert_eq!(response.0.diagnosis, "DR");
        assert_eq!(response.0.probability_dr, 0.9);
        assert_eq!(response.0.class_predicted, 0);
        assert!(response.0.note.is_none());
    }

    #[tokio::test]
    async fn test_dr_negative_prediction() {
        let state = SharedState {
            model: Some(Arc::new(MockModel {
                probabilities: [0.2, 0.8],
            })),
        };
        let multipart = multipart_upload("image", "image/png", &png_bytes()).await;

        let response = predict(State(state), multipart).await.unwrap();

        assert_eq!(response.0.diagnosis, "No_DR");
        assert_eq!(response.0.probability_no_dr, 0.8);
        assert_eq!(response.0.class_predicted, 1);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_a_server_error() {
        let state = SharedState {
            model: Some(Arc::new(MockModel {
                probabilities: [0.9, 0.1],
            })),
        };
        let multipart = multipart_upload("image", "image/jpeg", b"corrupted bytes").await;

        let error = predict(State(state), multipart).await.unwrap_err();

        assert!(matches!(error, PredictError::Decode(_)));
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_inference_failure_is_a_server_error() {
        let state = SharedState {
            model: Some(Arc::new(FailingModel)),
        };
        let multipart = multipart_upload("image", "image/png", &png_bytes()).await;

        let error = predict(State(state), multipart).await.unwrap_err();

        assert!(matches!(error, PredictError::Inference(_)));
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
