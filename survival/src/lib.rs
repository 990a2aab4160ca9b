//! 乳腺癌存活预测：记录解析、特征组装、模型加载与打分。
//!
//! 模型在启动时加载一次，之后以 [`SurvivalPredictor`] 的形式只读共享；
//! HTTP 服务与命令行工具都通过它完成预测。

pub mod inference;
pub mod model;
pub mod record;

pub use inference::{
    ConfidenceBucket, ModelConfig, PredictError, SurvivalAssessment, SurvivalPredictor,
    SurvivalResponse, predicted_outcome, survival_score,
};
pub use model::{ClassProbabilities, GradientBoostedTrees, ProbabilityModel};
pub use record::{FeatureError, FeatureVector, FieldValue, PatientRecord, Race, assemble_features};
