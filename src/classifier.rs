use std::path::Path;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{RiskAssessment, RiskFeatureVector};

pub const FEATURE_COUNT: usize = 8;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("training set is empty")]
    EmptyTrainingSet,
}

/// Probability-of-dropout estimate alongside the rule-based score.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Prediction {
    pub probability_at_risk: f64,
    pub confidence: f64,
}

/// Serialized model artifact: logistic-regression weights plus the
/// standardization parameters captured at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub accuracy: f64,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TrainingRow {
    pub features: [f64; FEATURE_COUNT],
    pub dropped_out: bool,
}

#[derive(Debug, Clone)]
pub struct DropoutClassifier {
    artifact: ModelArtifact,
}

/// The 8-feature vector the model consumes: the raw inputs plus the four
/// weighted factors from the rule-based pass.
pub fn classifier_features(
    features: &RiskFeatureVector,
    assessment: &RiskAssessment,
) -> [f64; FEATURE_COUNT] {
    [
        features.attendance_rate,
        features.average_score,
        features.behavior_score,
        features.engagement_score,
        assessment.attendance_factor,
        assessment.academic_factor,
        assessment.behavior_factor,
        assessment.engagement_factor,
    ]
}

impl DropoutClassifier {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::ModelUnavailable(format!("{}: {e}", path.display()))
        })?;
        let artifact: ModelArtifact = serde_json::from_str(&raw).map_err(|e| {
            ClassifierError::ModelUnavailable(format!("corrupt artifact {}: {e}", path.display()))
        })?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ClassifierError> {
        if artifact.weights.len() != FEATURE_COUNT
            || artifact.means.len() != FEATURE_COUNT
            || artifact.stds.len() != FEATURE_COUNT
        {
            return Err(ClassifierError::ModelUnavailable(format!(
                "artifact expects {FEATURE_COUNT} features, found {}",
                artifact.weights.len()
            )));
        }
        Ok(Self { artifact })
    }

    pub fn accuracy(&self) -> f64 {
        self.artifact.accuracy
    }

    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> Prediction {
        let mut z = self.artifact.bias;
        for i in 0..FEATURE_COUNT {
            z += self.artifact.weights[i] * standardize(features[i], i, &self.artifact);
        }
        let probability = sigmoid(z);
        Prediction {
            probability_at_risk: probability,
            confidence: probability.max(1.0 - probability) * 100.0,
        }
    }

    /// Batch gradient descent with an 80/20 holdout for the reported
    /// accuracy. Deliberately plain: eight features and a few thousand rows
    /// do not warrant more machinery.
    pub fn train(
        rows: &[TrainingRow],
        epochs: usize,
        learning_rate: f64,
    ) -> Result<ModelArtifact, ClassifierError> {
        if rows.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }

        let (means, stds) = standardization_params(rows);

        let mut shuffled: Vec<&TrainingRow> = rows.iter().collect();
        shuffled.shuffle(&mut rand::thread_rng());
        let split = (shuffled.len() * 4) / 5;
        let (train_rows, test_rows) = shuffled.split_at(split.max(1));

        let mut weights = [0.0f64; FEATURE_COUNT];
        let mut bias = 0.0f64;

        for _ in 0..epochs {
            let mut grad_w = [0.0f64; FEATURE_COUNT];
            let mut grad_b = 0.0f64;

            for row in train_rows {
                let mut z = bias;
                let mut x = [0.0f64; FEATURE_COUNT];
                for i in 0..FEATURE_COUNT {
                    x[i] = (row.features[i] - means[i]) / stds[i];
                    z += weights[i] * x[i];
                }
                let error = sigmoid(z) - if row.dropped_out { 1.0 } else { 0.0 };
                for i in 0..FEATURE_COUNT {
                    grad_w[i] += error * x[i];
                }
                grad_b += error;
            }

            let scale = learning_rate / train_rows.len() as f64;
            for i in 0..FEATURE_COUNT {
                weights[i] -= scale * grad_w[i];
            }
            bias -= scale * grad_b;
        }

        let artifact = ModelArtifact {
            weights: weights.to_vec(),
            bias,
            means: means.to_vec(),
            stds: stds.to_vec(),
            accuracy: 0.0,
            trained_at: Utc::now(),
        };
        let model = Self {
            artifact: artifact.clone(),
        };

        let eval_rows = if test_rows.is_empty() {
            train_rows
        } else {
            test_rows
        };
        let correct = eval_rows
            .iter()
            .filter(|row| {
                let predicted = model.predict(&row.features).probability_at_risk >= 0.5;
                predicted == row.dropped_out
            })
            .count();

        Ok(ModelArtifact {
            accuracy: correct as f64 / eval_rows.len() as f64,
            ..artifact
        })
    }
}

/// Synthetic training set in the shape of the historical data: labels follow
/// the same weighted-risk ground truth the rule-based scorer uses, plus
/// noise, so a trained model agrees with the rules on clear cases while
/// smoothing the boundaries. The factor columns use the supplied policy's
/// weights so the model trains on the same scale it will see at predict
/// time.
pub fn synthetic_training_rows(count: usize, policy: &crate::policy::RiskPolicy) -> Vec<TrainingRow> {
    let mut rng = rand::thread_rng();
    let mut rows = Vec::with_capacity(count);

    for _ in 0..count {
        let attendance: f64 = rng.gen_range(20.0..100.0);
        let average: f64 = rng.gen_range(20.0..100.0);
        let behavior: f64 = rng.gen_range(1.0..10.0);
        let engagement: f64 = rng.gen_range(0.0..100.0);

        let features = feature_row(attendance, average, behavior, engagement, policy);
        let raw = features[4] + features[5] + features[6] + features[7];
        let noise: f64 = rng.gen_range(-5.0..5.0);
        let dropped_out = raw + noise > 50.0 || attendance < policy.attendance_override_below - 10.0;

        rows.push(TrainingRow {
            features,
            dropped_out,
        });
    }

    rows
}

fn feature_row(
    attendance_rate: f64,
    average_score: f64,
    behavior_score: f64,
    engagement_score: f64,
    policy: &crate::policy::RiskPolicy,
) -> [f64; FEATURE_COUNT] {
    [
        attendance_rate,
        average_score,
        behavior_score,
        engagement_score,
        (100.0 - attendance_rate).max(0.0) * policy.attendance_weight,
        (100.0 - average_score).max(0.0) * policy.academic_weight,
        ((10.0 - behavior_score) * 2.0).max(0.0) * policy.behavior_weight,
        (100.0 - engagement_score).max(0.0) * policy.engagement_weight,
    ]
}

/// Labeled history for offline training: the four raw inputs plus the
/// dropout outcome. Factor columns are derived with the supplied policy so
/// training and scoring see the same 8 features.
pub fn rows_from_labeled_csv(
    path: &Path,
    policy: &crate::policy::RiskPolicy,
) -> anyhow::Result<Vec<TrainingRow>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        attendance_rate: f64,
        average_score: f64,
        behavior_score: f64,
        engagement_score: f64,
        dropped_out: bool,
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        rows.push(TrainingRow {
            features: feature_row(
                row.attendance_rate,
                row.average_score,
                row.behavior_score,
                row.engagement_score,
                policy,
            ),
            dropped_out: row.dropped_out,
        });
    }

    Ok(rows)
}

fn standardization_params(rows: &[TrainingRow]) -> ([f64; FEATURE_COUNT], [f64; FEATURE_COUNT]) {
    let n = rows.len().max(1) as f64;
    let mut means = [0.0f64; FEATURE_COUNT];
    for row in rows {
        for i in 0..FEATURE_COUNT {
            means[i] += row.features[i];
        }
    }
    for mean in means.iter_mut() {
        *mean /= n;
    }

    let mut stds = [0.0f64; FEATURE_COUNT];
    for row in rows {
        for i in 0..FEATURE_COUNT {
            let diff = row.features[i] - means[i];
            stds[i] += diff * diff;
        }
    }
    for std in stds.iter_mut() {
        *std = (*std / n).sqrt();
        if *std < 1e-9 {
            *std = 1.0;
        }
    }

    (means, stds)
}

fn standardize(value: f64, index: usize, artifact: &ModelArtifact) -> f64 {
    (value - artifact.means[index]) / artifact.stds[index]
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
