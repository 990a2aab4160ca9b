use crate::EvalResult;
use crate::accuracy::{AccuracyError, AccuracyReport, ClassPredictions, GroundTruth, aggregate};
use crate::config::{EvalConfig, FailurePolicy};
use crate::endpoint::InferenceEndpoint;
use crate::error::EvalError;
use crate::result::{ImagePrediction, parse_prediction};
use crate::storage::{ObjectStore, StagedObject, file_name};
use indexmap::IndexMap;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

/// [`Evaluator::run`] 收集到的预测结果与失败记录。
#[derive(Debug, Default)]
pub struct EvalOutcome {
    pub def_preds: ClassPredictions,
    pub non_def_preds: ClassPredictions,
    /// 文件名到导致其未计入统计的错误。
    pub problem_files: IndexMap<String, EvalError>,
}

impl EvalOutcome {
    pub fn predictions(&self, class: GroundTruth) -> &ClassPredictions {
        match class {
            GroundTruth::Defective => &self.def_preds,
            GroundTruth::NonDefective => &self.non_def_preds,
        }
    }

    fn predictions_mut(&mut self, class: GroundTruth) -> &mut ClassPredictions {
        match class {
            GroundTruth::Defective => &mut self.def_preds,
            GroundTruth::NonDefective => &mut self.non_def_preds,
        }
    }

    pub fn report(&self) -> Result<AccuracyReport, AccuracyError> {
        aggregate(&self.def_preds, &self.non_def_preds)
    }
}

/// 随机抽取的一个对象及其预测。
#[derive(Debug, Clone)]
pub struct SampleResult {
    pub class: GroundTruth,
    pub key: String,
    pub prediction: ImagePrediction,
}

/// 逐个对已标注对象打分。
pub struct Evaluator<S, E> {
    store: S,
    endpoint: E,
    config: EvalConfig,
}

impl<S: ObjectStore, E: InferenceEndpoint> Evaluator<S, E> {
    pub fn new(store: S, endpoint: E, config: EvalConfig) -> Self {
        Self {
            store,
            endpoint,
            config,
        }
    }

    /// `<key_prefix>/<类别目录>` 下的所有键。
    pub async fn list_class(&self, class: GroundTruth) -> EvalResult<Vec<String>> {
        let prefix = self.config.class_prefix(class.label());
        self.store.list_keys(&self.config.bucket, &prefix).await
    }

    /// 下载单个对象，发送给端点并解析结果。
    pub async fn fetch_and_predict(&self, key: &str) -> EvalResult<ImagePrediction> {
        let bytes = self.store.get_object(&self.config.bucket, key).await?;

        let image = if self.config.stage_to_disk {
            let staged = StagedObject::write(file_name(key), &bytes)?;
            debug!("{key} 已写入 {}", staged.path().display());
            let image = staged.read()?;
            staged.remove()?;
            image
        } else {
            bytes
        };

        let body = self.endpoint.invoke(&image).await?;
        parse_prediction(&body)
    }

    /// 依次评估两个类别，先缺陷类。
    ///
    /// 列举失败总是中止。单个对象的失败按 [`EvalConfig::failure_policy`] 处理，
    /// 两类一致；旧版脚本缺陷类中止、非缺陷类记录，此处有意统一。
    pub async fn run(&self) -> EvalResult<EvalOutcome> {
        let mut outcome = EvalOutcome::default();

        for class in GroundTruth::ALL {
            let keys = self.list_class(class).await?;
            info!(class = %class, objects = keys.len(), "开始评估类别");

            for (idx, key) in keys.iter().enumerate() {
                let name = file_name(key).to_string();
                match self.fetch_and_predict(key).await {
                    Ok(prediction) => {
                        debug!(
                            "[{}/{}] {} => {}",
                            idx + 1,
                            keys.len(),
                            key,
                            prediction.predicted_label
                        );
                        outcome
                            .predictions_mut(class)
                            .insert(name, prediction.into());
                    }
                    Err(err) => match self.config.failure_policy {
                        FailurePolicy::Abort => {
                            return Err(EvalError::Aborted {
                                key: key.clone(),
                                source: Box::new(err),
                            });
                        }
                        FailurePolicy::Record => {
                            warn!("{key}: {err}");
                            outcome.problem_files.insert(name, err);
                        }
                    },
                }
            }
        }

        info!(
            defective = outcome.def_preds.len(),
            non_defective = outcome.non_def_preds.len(),
            problems = outcome.problem_files.len(),
            "评估完成"
        );
        Ok(outcome)
    }

    /// 每个类别随机抽取一个对象并打分。
    pub async fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> EvalResult<Vec<SampleResult>> {
        let mut samples = Vec::with_capacity(GroundTruth::ALL.len());

        for class in GroundTruth::ALL {
            let keys = self.list_class(class).await?;
            let key = keys
                .choose(rng)
                .cloned()
                .ok_or_else(|| EvalError::EmptyListing {
                    bucket: self.config.bucket.clone(),
                    prefix: self.config.class_prefix(class.label()),
                })?;
            let prediction = self.fetch_and_predict(&key).await?;
            samples.push(SampleResult {
                class,
                key,
                prediction,
            });
        }

        Ok(samples)
    }
}
