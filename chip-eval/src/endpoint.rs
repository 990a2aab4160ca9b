use crate::error::EvalError;
use async_trait::async_trait;
use aws_sdk_sagemakerruntime::Client as RuntimeClient;
use aws_sdk_sagemakerruntime::error::DisplayErrorContext;
use aws_sdk_sagemakerruntime::primitives::Blob;

/// 微调后的 Inception v3 图像分类端点。
pub const DEFAULT_ENDPOINT: &str = "jumpstart-ftc-tf-ic-imagenet-inception-v3-classificati";

/// 请求体的内容类型（原始图像字节）。
pub const REQUEST_CONTENT_TYPE: &str = "application/x-image";

/// 要求端点同时返回标签列表与概率。
pub const RESPONSE_ACCEPT: &str = "application/json;verbose";

/// 远程图像分类器。
#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    /// 提交原始图像字节，返回原始响应体。
    async fn invoke(&self, image: &[u8]) -> Result<Vec<u8>, EvalError>;
}

/// 基于 SageMaker 实时端点的 [`InferenceEndpoint`]。
///
/// 重试与超时沿用 SDK 默认值。
pub struct SageMakerEndpoint {
    client: RuntimeClient,
    endpoint_name: String,
}

impl SageMakerEndpoint {
    pub fn new(client: RuntimeClient, endpoint_name: impl Into<String>) -> Self {
        Self {
            client,
            endpoint_name: endpoint_name.into(),
        }
    }

    pub fn from_config(config: &aws_config::SdkConfig, endpoint_name: impl Into<String>) -> Self {
        Self::new(RuntimeClient::new(config), endpoint_name)
    }
}

#[async_trait]
impl InferenceEndpoint for SageMakerEndpoint {
    async fn invoke(&self, image: &[u8]) -> Result<Vec<u8>, EvalError> {
        let output = self
            .client
            .invoke_endpoint()
            .endpoint_name(&self.endpoint_name)
            .content_type(REQUEST_CONTENT_TYPE)
            .accept(RESPONSE_ACCEPT)
            .body(Blob::new(image.to_vec()))
            .send()
            .await
            .map_err(|e| {
                EvalError::Inference(format!("{}: {}", self.endpoint_name, DisplayErrorContext(&e)))
            })?;

        output
            .body()
            .map(|body| body.as_ref().to_vec())
            .ok_or_else(|| EvalError::Inference(format!("{}: empty response body", self.endpoint_name)))
    }
}
