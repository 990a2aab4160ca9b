use crate::result::ImagePrediction;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 由对象所在目录决定的真实类别。
///
/// 只用于计分，不会发送给端点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroundTruth {
    Defective,
    NonDefective,
}

impl GroundTruth {
    /// 评估顺序：先全部缺陷类。
    pub const ALL: [GroundTruth; 2] = [GroundTruth::Defective, GroundTruth::NonDefective];

    /// 判为命中时端点应返回的标签，同时也是目录名。
    pub fn label(&self) -> &'static str {
        match self {
            GroundTruth::Defective => "Defective",
            GroundTruth::NonDefective => "Non-Defective",
        }
    }
}

impl fmt::Display for GroundTruth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 单个对象的预测标签与概率向量。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionEntry {
    pub predicted_label: String,
    pub probabilities: Vec<f64>,
}

impl From<ImagePrediction> for PredictionEntry {
    fn from(prediction: ImagePrediction) -> Self {
        Self {
            predicted_label: prediction.predicted_label,
            probabilities: prediction.probabilities,
        }
    }
}

/// 文件名到预测结果，按评估顺序排列；重复的文件名覆盖之前的条目。
pub type ClassPredictions = IndexMap<String, PredictionEntry>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccuracyError {
    #[error("no predictions for class {0}; accuracy is undefined")]
    EmptyClass(GroundTruth),
}

/// 某一真实类别的正确数与总数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccuracyTally {
    pub class: GroundTruth,
    pub correct: usize,
    pub total: usize,
}

impl AccuracyTally {
    /// 统计预测标签与类别标签完全一致（区分大小写）的条目。
    pub fn from_predictions(class: GroundTruth, predictions: &ClassPredictions) -> Self {
        let correct = predictions
            .values()
            .filter(|entry| entry.predicted_label == class.label())
            .count();
        Self {
            class,
            correct,
            total: predictions.len(),
        }
    }

    pub fn ratio(&self) -> Result<f64, AccuracyError> {
        if self.total == 0 {
            return Err(AccuracyError::EmptyClass(self.class));
        }
        Ok(self.correct as f64 / self.total as f64)
    }
}

/// 一次评估的总体与分类准确率。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub defective: AccuracyTally,
    pub non_defective: AccuracyTally,
    pub accuracy: f64,
    pub defective_accuracy: f64,
    pub non_defective_accuracy: f64,
}

/// 计算总体与分类准确率，任一类别为空时返回错误。
pub fn aggregate(
    def_preds: &ClassPredictions,
    non_def_preds: &ClassPredictions,
) -> Result<AccuracyReport, AccuracyError> {
    let defective = AccuracyTally::from_predictions(GroundTruth::Defective, def_preds);
    let non_defective = AccuracyTally::from_predictions(GroundTruth::NonDefective, non_def_preds);

    let defective_accuracy = defective.ratio()?;
    let non_defective_accuracy = non_defective.ratio()?;
    let accuracy = (defective.correct + non_defective.correct) as f64
        / (defective.total + non_defective.total) as f64;

    Ok(AccuracyReport {
        defective,
        non_defective,
        accuracy,
        defective_accuracy,
        non_defective_accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preds(labels: &[&str]) -> ClassPredictions {
        labels
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                (
                    format!("chip_{idx:03}.jpg"),
                    PredictionEntry {
                        predicted_label: label.to_string(),
                        probabilities: vec![0.5, 0.5],
                    },
                )
            })
            .collect()
    }

    #[test]
    fn counts_exact_label_matches() {
        let def_preds = preds(&["Defective", "Defective", "Non-Defective"]);
        let non_def_preds = preds(&["Non-Defective", "Defective"]);

        let report = aggregate(&def_preds, &non_def_preds).unwrap();
        assert_eq!(report.defective.correct, 2);
        assert_eq!(report.defective.total, 3);
        assert_eq!(report.non_defective.correct, 1);
        assert_eq!(report.non_defective.total, 2);
        assert_eq!(report.accuracy, 3.0 / 5.0);
        assert_eq!(report.defective_accuracy, 2.0 / 3.0);
        assert_eq!(report.non_defective_accuracy, 0.5);
    }

    #[test]
    fn label_match_is_case_sensitive() {
        let def_preds = preds(&["defective", "Defective "]);
        let non_def_preds = preds(&["Non-Defective"]);
        let report = aggregate(&def_preds, &non_def_preds).unwrap();
        assert_eq!(report.defective.correct, 0);
    }

    #[test]
    fn empty_class_is_an_error() {
        let def_preds = preds(&["Defective"]);
        let empty = ClassPredictions::new();

        assert_eq!(
            aggregate(&def_preds, &empty),
            Err(AccuracyError::EmptyClass(GroundTruth::NonDefective))
        );
        assert_eq!(
            aggregate(&empty, &def_preds),
            Err(AccuracyError::EmptyClass(GroundTruth::Defective))
        );
    }

    #[test]
    fn repeated_file_name_replaces_entry() {
        let mut def_preds = preds(&["Non-Defective"]);
        def_preds.insert(
            "chip_000.jpg".to_string(),
            PredictionEntry {
                predicted_label: "Defective".to_string(),
                probabilities: vec![1.0, 0.0],
            },
        );
        let tally = AccuracyTally::from_predictions(GroundTruth::Defective, &def_preds);
        assert_eq!(tally.total, 1);
        assert_eq!(tally.correct, 1);
    }
}
