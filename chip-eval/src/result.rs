use crate::error::EvalError;
use serde::{Deserialize, Serialize};

/// 图像分类端点的解析结果。
///
/// `labels` 与 `probabilities` 按位置一一对应。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePrediction {
    pub predicted_label: String,
    pub probabilities: Vec<f64>,
    pub labels: Vec<String>,
}

impl ImagePrediction {
    /// 预测标签对应的概率；标签不在列表中时为 `None`。
    pub fn top_probability(&self) -> Option<f64> {
        self.labels
            .iter()
            .position(|label| *label == self.predicted_label)
            .and_then(|idx| self.probabilities.get(idx).copied())
    }

    /// 按端点返回顺序给出 `(标签, 概率)`。
    pub fn distribution(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.probabilities.iter().copied())
    }
}

/// 解析 verbose 模式下的 JSON 响应体。
pub fn parse_prediction(body: &[u8]) -> Result<ImagePrediction, EvalError> {
    let prediction: ImagePrediction =
        serde_json::from_slice(body).map_err(|e| EvalError::Response(e.to_string()))?;

    if prediction.labels.len() != prediction.probabilities.len() {
        return Err(EvalError::Response(format!(
            "{} labels but {} probabilities",
            prediction.labels.len(),
            prediction.probabilities.len()
        )));
    }

    Ok(prediction)
}
