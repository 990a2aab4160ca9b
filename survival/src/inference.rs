use crate::model::{GradientBoostedTrees, ProbabilityModel};
use crate::record::{FeatureError, FeatureVector, PatientRecord, assemble_features};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, sync::Arc};
use thiserror::Error;

/// 概率严格大于该值时判定为存活（1）。
pub const SURVIVAL_THRESHOLD: f64 = 0.66;

/// 模型加载配置。
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./model/model_grad_boost_02.json"),
        }
    }
}

/// 置信度分档。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceBucket {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ConfidenceBucket {
    /// 按 0–1 的原始概率分档（未截断、未乘 100）。
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.85 {
            ConfidenceBucket::Excellent
        } else if probability >= 0.5 {
            ConfidenceBucket::Good
        } else if probability >= 0.3 {
            ConfidenceBucket::Fair
        } else {
            ConfidenceBucket::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBucket::Excellent => "Excellent",
            ConfidenceBucket::Good => "Good",
            ConfidenceBucket::Fair => "Fair",
            ConfidenceBucket::Poor => "Poor",
        }
    }
}

impl fmt::Display for ConfidenceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 存活分数：概率乘 100 后向零截断，取值 0–100。
pub fn survival_score(probability: f64) -> u8 {
    (probability * 100.0).trunc().clamp(0.0, 100.0) as u8
}

/// 二值结果：概率严格大于 0.66 时为 1。
pub fn predicted_outcome(probability: f64) -> u8 {
    u8::from(probability > SURVIVAL_THRESHOLD)
}

/// 一次评估的完整结果。
///
/// 注意：`bucket` 基于 0–1 概率分档，而对外返回的 `score` 是 0–100 的整数，
/// 两者刻度不同，沿用历史行为，不做统一。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurvivalAssessment {
    pub features: FeatureVector,
    pub probability: f64,
    pub score: u8,
    pub bucket: ConfidenceBucket,
    pub prediction: u8,
}

impl SurvivalAssessment {
    pub fn from_probability(features: FeatureVector, probability: f64) -> Self {
        Self {
            features,
            probability,
            score: survival_score(probability),
            bucket: ConfidenceBucket::from_probability(probability),
            prediction: predicted_outcome(probability),
        }
    }

    pub fn response(&self) -> SurvivalResponse {
        SurvivalResponse {
            prediction: self.prediction,
            prob_survived: format!("{}%", self.score),
        }
    }
}

/// HTTP 接口返回的结构。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurvivalResponse {
    pub prediction: u8,
    pub prob_survived: String,
}

/// 评估失败：输入校验失败或模型推理失败。
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error("model scoring failed: {0:#}")]
    Model(anyhow::Error),
}

/// 封装只读模型，可在多个请求间共享。
#[derive(Clone)]
pub struct SurvivalPredictor {
    model: Arc<dyn ProbabilityModel>,
}

impl SurvivalPredictor {
    pub fn new(model: Arc<dyn ProbabilityModel>) -> Self {
        Self { model }
    }

    /// 根据配置加载梯度提升树模型。
    pub fn load(config: &ModelConfig) -> anyhow::Result<Self> {
        let model = GradientBoostedTrees::load(&config.model_path)?;
        tracing::info!(
            path = %config.model_path.display(),
            trees = model.trees.len(),
            "model loaded"
        );
        Ok(Self::new(Arc::new(model)))
    }

    /// 组装特征并打分。
    pub fn assess(&self, record: &PatientRecord) -> Result<SurvivalAssessment, PredictError> {
        let features = assemble_features(record)?;
        let probs = self
            .model
            .predict_proba(&features)
            .map_err(PredictError::Model)?;
        Ok(SurvivalAssessment::from_probability(
            features,
            probs.positive,
        ))
    }
}
