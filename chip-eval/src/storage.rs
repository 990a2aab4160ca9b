use crate::error::EvalError;
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::DisplayErrorContext;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// 已标注对象所在存储桶的只读访问。
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// `prefix` 下的全部键，保持存储返回的顺序。
    ///
    /// 只发一次请求，仅取第一页。
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, EvalError>;

    /// 读取单个对象的完整内容。
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, EvalError>;
}

/// 基于 Amazon S3 的 [`ObjectStore`]。
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(S3Client::new(config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, EvalError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| {
                EvalError::Storage(format!(
                    "list s3://{bucket}/{prefix}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        if response.is_truncated().unwrap_or(false) {
            debug!("s3://{bucket}/{prefix} 列举结果被截断，仅使用第一页");
        }

        Ok(response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, EvalError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                EvalError::Storage(format!("get s3://{bucket}/{key}: {}", DisplayErrorContext(&e)))
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| EvalError::Storage(format!("read s3://{bucket}/{key}: {e}")))?;

        Ok(data.into_bytes().to_vec())
    }
}

/// 键中最后一个 `/` 之后的部分。
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// 写入私有临时目录的对象。
///
/// 调用 [`StagedObject::remove`] 或 drop 时删除文件及目录。
pub struct StagedObject {
    dir: TempDir,
    path: PathBuf,
}

impl StagedObject {
    pub fn write(file_name: &str, bytes: &[u8]) -> Result<Self, EvalError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(file_name);
        fs::write(&path, bytes)?;
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>, EvalError> {
        Ok(fs::read(&self.path)?)
    }

    pub fn remove(self) -> Result<(), EvalError> {
        self.dir.close()?;
        Ok(())
    }
}
