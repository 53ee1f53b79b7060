use serde::Serialize;

// Training label order: index 0 is the DR-positive class, index 1 the
// negative one. This is the reverse of the usual binary convention and
// must stay in sync with the trained model.
const DR_CLASS: u32 = 0;

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub diagnosis: String,
    pub probability_dr: f32,
    pub probability_no_dr: f32,
    pub class_predicted: u32,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Prediction {
    /// Maps the raw model output to a diagnosis. Ties resolve to the first
    /// index, matching an argmax over the output vector.
    pub fn from_probabilities(probabilities: [f32; 2]) -> Self {
        let class_predicted: u32 = if probabilities[0] >= probabilities[1] {
            0
        } else {
            1
        };

        let (diagnosis, recommendation) = if class_predicted == DR_CLASS {
            ("DR", "Follow-up exam recommended for confirmation")
        } else {
            ("No_DR", "Negative result")
        };

        Self {
            diagnosis: diagnosis.to_string(),
            probability_dr: probabilities[0],
            probability_no_dr: probabilities[1],
            class_predicted,
            recommendation: recommendation.to_string(),
            note: None,
        }
    }

    /// Fixed response served while no model is loaded. The `note` field
    /// marks the payload as non-authoritative for downstream consumers.
    pub fn placeholder() -> Self {
        Self {
            diagnosis: "DR".to_string(),
            probability_dr: 0.85,
            probability_no_dr: 0.15,
            class_predicted: 0,
            recommendation: "TEST MODE - retake the exam for confirmation".to_string(),
            note: Some("Model not loaded - returning placeholder data".to_string()),
        }
    }
}
