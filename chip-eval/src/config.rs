use crate::endpoint::DEFAULT_ENDPOINT;
use aws_config::{BehaviorVersion, SdkConfig};

/// 存放已标注薯片测试图像的存储桶。
pub const DEFAULT_BUCKET: &str = "pepsico-potato-chip-dataset";

/// `Defective/` 与 `Non-Defective/` 两个目录所在的键前缀。
pub const DEFAULT_KEY_PREFIX: &str = "Test";

/// 单个对象下载或推理失败时的处理方式。
///
/// 旧版脚本在缺陷类遇错即中止、在非缺陷类记录后继续；这里有意统一为同一策略，两类一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// 遇到第一个失败对象即中止整批评估。
    Abort,
    /// 以文件名记录失败并继续，失败对象不计入准确率。
    #[default]
    Record,
}

/// 一次评估的配置。
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// 列举与下载所用的存储桶。
    pub bucket: String,
    /// 与类别目录拼接的前缀，例如 `Test/Defective`。
    pub key_prefix: String,
    /// 已部署的推理端点名称。
    pub endpoint_name: String,
    /// 失败处理策略，缺陷类与非缺陷类共用（有意统一，见 [`FailurePolicy`]）。
    pub failure_policy: FailurePolicy,
    /// 推理前先把对象写入临时文件再读回。
    pub stage_to_disk: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            endpoint_name: DEFAULT_ENDPOINT.to_string(),
            failure_policy: FailurePolicy::default(),
            stage_to_disk: false,
        }
    }
}

impl EvalConfig {
    /// 某个类别目录的列举前缀。
    pub fn class_prefix(&self, folder: &str) -> String {
        format!("{}/{}", self.key_prefix.trim_end_matches('/'), folder)
    }
}

/// AWS 凭证与区域来源。
///
/// 未设置的项回退到默认的凭证链。
#[derive(Debug, Clone, Default)]
pub struct AwsOptions {
    pub region: Option<String>,
    pub profile: Option<String>,
}

impl AwsOptions {
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(ref region) = self.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(ref profile) = self.profile {
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_test_split() {
        let config = EvalConfig::default();
        assert_eq!(config.bucket, "pepsico-potato-chip-dataset");
        assert_eq!(config.class_prefix("Defective"), "Test/Defective");
        assert_eq!(config.failure_policy, FailurePolicy::Record);
        assert!(!config.stage_to_disk);
    }

    #[test]
    fn trailing_slash_in_prefix_is_ignored() {
        let config = EvalConfig {
            key_prefix: "Test/".to_string(),
            ..EvalConfig::default()
        };
        assert_eq!(config.class_prefix("Non-Defective"), "Test/Non-Defective");
    }
}
