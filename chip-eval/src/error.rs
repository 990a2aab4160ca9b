use thiserror::Error;

/// 单个对象在下载、推理或解析时的错误。
#[derive(Debug, Error)]
pub enum EvalError {
    /// 列举或下载对象失败。
    #[error("storage request failed: {0}")]
    Storage(String),

    /// 调用推理端点失败。
    #[error("inference call failed: {0}")]
    Inference(String),

    /// 端点返回的内容不符合预期格式。
    #[error("unexpected inference response: {0}")]
    Response(String),

    /// 写入本地临时文件失败。
    #[error("local staging failed: {0}")]
    Io(#[from] std::io::Error),

    /// 类别前缀下没有任何对象，无法抽样。
    #[error("no objects under s3://{bucket}/{prefix}")]
    EmptyListing { bucket: String, prefix: String },

    /// 在 [`FailurePolicy::Abort`](crate::FailurePolicy::Abort) 策略下于该对象处中止。
    #[error("evaluation aborted at {key}: {source}")]
    Aborted {
        key: String,
        #[source]
        source: Box<EvalError>,
    },
}
