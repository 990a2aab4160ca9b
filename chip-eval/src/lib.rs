//! 薯片缺陷分类端点的准确率评估。
//!
//! 列举对象存储中已标注的测试图像（`<prefix>/Defective`、`<prefix>/Non-Defective`），
//! 逐张发送给已部署的分类端点，并统计预测标签与所在目录一致的比例。
//! 全程串行，一次处理一个对象。

mod accuracy;
mod config;
mod endpoint;
mod error;
mod evaluator;
mod result;
mod storage;

pub use accuracy::{
    AccuracyError, AccuracyReport, AccuracyTally, ClassPredictions, GroundTruth, PredictionEntry,
    aggregate,
};
pub use config::{AwsOptions, DEFAULT_BUCKET, DEFAULT_KEY_PREFIX, EvalConfig, FailurePolicy};
pub use endpoint::{
    DEFAULT_ENDPOINT, InferenceEndpoint, REQUEST_CONTENT_TYPE, RESPONSE_ACCEPT, SageMakerEndpoint,
};
pub use error::EvalError;
pub use evaluator::{EvalOutcome, Evaluator, SampleResult};
pub use result::{ImagePrediction, parse_prediction};
pub use storage::{ObjectStore, S3ObjectStore, StagedObject, file_name};

/// crate 内统一的结果类型。
pub type EvalResult<T> = Result<T, EvalError>;
