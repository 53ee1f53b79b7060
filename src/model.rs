use crate::config::ModelConfig;
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model artifact not found: {0:?}")]
    NotFound(PathBuf),
    #[error("failed to load model: {0}")]
    Load(#[from] ort::Error),
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("session mutex poisoned")]
    SessionPoisoned,
    #[error("inference failed: {0}")]
    Run(#[from] ort::Error),
    #[error("model returned {0} output values, expected 2")]
    OutputShape(usize),
}

/// Seam between the request handlers and the inference runtime.
pub trait Model: Send + Sync + 'static {
    fn infer(&self, input: &Array<f32, Ix4>) -> Result<[f32; 2], InferenceError>;
}

pub struct OrtModel {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
}

impl OrtModel {
    pub fn load(model_config: &ModelConfig) -> Result<Self, ModelError> {
        let model_path = model_config.get_model_path();
        if !model_path.exists() {
            return Err(ModelError::NotFound(model_path));
        }

        // Session::run takes &mut, so a handful of sessions behind mutexes
        // are dispatched round-robin to concurrent requests.
        let sessions = (0..model_config.num_sessions)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(&model_path)?;
                Ok(Mutex::new(session))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!("Created {} ONNX sessions", sessions.len());

        Ok(Self {
            sessions,
            counter: AtomicUsize::new(0),
        })
    }
}

impl Model for OrtModel {
    fn infer(&self, input: &Array<f32, Ix4>) -> Result<[f32; 2], InferenceError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|_| InferenceError::SessionPoisoned)?;

        tracing::debug!("Handling request with session {}", index);
        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let (_, data) = outputs[0].try_extract_tensor::<f32>()?;
        if data.len() < 2 {
            return Err(InferenceError::OutputShape(data.len()));
        }

        Ok([data[0], data[1]])
    }
}
