use async_trait::async_trait;
use chip_eval::{
    EvalConfig, EvalError, Evaluator, FailurePolicy, GroundTruth, InferenceEndpoint, ObjectStore,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// 内存中的存储桶，列举时按字典序返回键，与 S3 一致。
#[derive(Default)]
struct MemoryStore {
    objects: BTreeMap<String, Vec<u8>>,
    unreadable: HashSet<String>,
}

impl MemoryStore {
    fn put(mut self, key: &str, body: &str) -> Self {
        self.objects.insert(key.to_string(), body.as_bytes().to_vec());
        self
    }

    fn unreadable(mut self, key: &str) -> Self {
        self.objects.insert(key.to_string(), Vec::new());
        self.unreadable.insert(key.to_string());
        self
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, EvalError> {
        assert_eq!(bucket, "test-bucket");
        Ok(self
            .objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get_object(&self, _bucket: &str, key: &str) -> Result<Vec<u8>, EvalError> {
        if self.unreadable.contains(key) {
            return Err(EvalError::Storage(format!("access denied: {key}")));
        }
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::Storage(format!("no such key: {key}")))
    }
}

/// 把图像内容原样作为预测标签返回；`"garbage"` 返回无法解析的响应，
/// `"timeout"` 返回调用失败。
#[derive(Default)]
struct EchoEndpoint {
    seen: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl InferenceEndpoint for EchoEndpoint {
    async fn invoke(&self, image: &[u8]) -> Result<Vec<u8>, EvalError> {
        self.seen.lock().unwrap().push(image.to_vec());
        let label = String::from_utf8_lossy(image).to_string();
        match label.as_str() {
            "garbage" => Ok(b"<html>bad gateway</html>".to_vec()),
            "timeout" => Err(EvalError::Inference("timed out".to_string())),
            _ => {
                let (p_def, p_non) = if label == "Defective" { (0.8, 0.2) } else { (0.3, 0.7) };
                Ok(serde_json::to_vec(&serde_json::json!({
                    "predicted_label": label,
                    "labels": ["Defective", "Non-Defective"],
                    "probabilities": [p_def, p_non],
                }))
                .unwrap())
            }
        }
    }
}

fn config(policy: FailurePolicy) -> EvalConfig {
    EvalConfig {
        bucket: "test-bucket".to_string(),
        failure_policy: policy,
        ..EvalConfig::default()
    }
}

fn labelled_store() -> MemoryStore {
    MemoryStore::default()
        .put("Test/Defective/d1.jpg", "Defective")
        .put("Test/Defective/d2.jpg", "Defective")
        .put("Test/Defective/d3.jpg", "Non-Defective")
        .put("Test/Non-Defective/n1.jpg", "Non-Defective")
        .put("Test/Non-Defective/n2.jpg", "Defective")
        .put("Train/Defective/ignored.jpg", "Defective")
}

#[tokio::test]
async fn full_run_tallies_each_class() {
    let evaluator = Evaluator::new(
        labelled_store(),
        EchoEndpoint::default(),
        config(FailurePolicy::Record),
    );

    let outcome = evaluator.run().await.unwrap();
    assert_eq!(
        outcome.def_preds.keys().collect::<Vec<_>>(),
        vec!["d1.jpg", "d2.jpg", "d3.jpg"]
    );
    assert_eq!(outcome.predictions(GroundTruth::NonDefective).len(), 2);
    assert!(outcome.problem_files.is_empty());
    assert_eq!(
        outcome.def_preds["d1.jpg"].probabilities,
        vec![0.8, 0.2]
    );

    let report = outcome.report().unwrap();
    assert_eq!(report.defective.correct, 2);
    assert_eq!(report.non_defective.correct, 1);
    assert_eq!(report.accuracy, 3.0 / 5.0);
}

#[tokio::test]
async fn objects_are_scored_sequentially_defective_first() {
    let endpoint = EchoEndpoint::default();
    let seen = endpoint.seen.clone();
    let store = MemoryStore::default()
        .put("Test/Non-Defective/a.jpg", "Non-Defective")
        .put("Test/Defective/z.jpg", "Defective");
    let evaluator = Evaluator::new(store, endpoint, config(FailurePolicy::Record));

    evaluator.run().await.unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![b"Defective".to_vec(), b"Non-Defective".to_vec()]
    );
}

#[tokio::test]
async fn record_policy_keeps_going_in_both_classes() {
    let store = labelled_store()
        .unreadable("Test/Defective/d4.jpg")
        .put("Test/Non-Defective/n3.jpg", "garbage")
        .put("Test/Non-Defective/n4.jpg", "timeout");
    let evaluator = Evaluator::new(store, EchoEndpoint::default(), config(FailurePolicy::Record));

    let outcome = evaluator.run().await.unwrap();
    assert_eq!(outcome.def_preds.len(), 3);
    assert_eq!(outcome.non_def_preds.len(), 2);
    assert_eq!(
        outcome.problem_files.keys().collect::<Vec<_>>(),
        vec!["d4.jpg", "n3.jpg", "n4.jpg"]
    );
    assert!(matches!(outcome.problem_files["d4.jpg"], EvalError::Storage(_)));
    assert!(matches!(outcome.problem_files["n3.jpg"], EvalError::Response(_)));
    assert!(matches!(outcome.problem_files["n4.jpg"], EvalError::Inference(_)));

    // 失败对象不计入总数。
    let report = outcome.report().unwrap();
    assert_eq!(report.defective.total, 3);
    assert_eq!(report.non_defective.total, 2);
}

#[tokio::test]
async fn abort_policy_stops_at_first_failure_in_either_class() {
    let store = labelled_store().unreadable("Test/Defective/d0.jpg");
    let evaluator = Evaluator::new(store, EchoEndpoint::default(), config(FailurePolicy::Abort));
    let err = evaluator.run().await.unwrap_err();
    match err {
        EvalError::Aborted { key, source } => {
            assert_eq!(key, "Test/Defective/d0.jpg");
            assert!(matches!(*source, EvalError::Storage(_)));
        }
        other => panic!("unexpected error: {other}"),
    }

    let store = labelled_store().put("Test/Non-Defective/n0.jpg", "timeout");
    let evaluator = Evaluator::new(store, EchoEndpoint::default(), config(FailurePolicy::Abort));
    assert!(matches!(
        evaluator.run().await,
        Err(EvalError::Aborted { .. })
    ));
}

#[tokio::test]
async fn empty_class_cannot_be_scored() {
    let store = MemoryStore::default().put("Test/Defective/d1.jpg", "Defective");
    let evaluator = Evaluator::new(store, EchoEndpoint::default(), config(FailurePolicy::Record));

    let outcome = evaluator.run().await.unwrap();
    assert!(outcome.non_def_preds.is_empty());
    assert!(outcome.report().is_err());
}

#[tokio::test]
async fn staging_to_disk_sends_identical_bytes() {
    let store = MemoryStore::default()
        .put("Test/Defective/d1.jpg", "Defective")
        .put("Test/Non-Defective/n1.jpg", "Non-Defective");
    let endpoint = EchoEndpoint::default();
    let seen = endpoint.seen.clone();
    let evaluator = Evaluator::new(
        store,
        endpoint,
        EvalConfig {
            stage_to_disk: true,
            ..config(FailurePolicy::Abort)
        },
    );

    let prediction = evaluator
        .fetch_and_predict("Test/Defective/d1.jpg")
        .await
        .unwrap();
    assert_eq!(prediction.predicted_label, "Defective");
    assert_eq!(prediction.top_probability(), Some(0.8));
    assert_eq!(*seen.lock().unwrap(), vec![b"Defective".to_vec()]);
}

#[tokio::test]
async fn sample_picks_one_object_per_class() {
    let evaluator = Evaluator::new(
        labelled_store(),
        EchoEndpoint::default(),
        config(FailurePolicy::Record),
    );
    let mut rng = StdRng::seed_from_u64(7);

    let samples = evaluator.sample(&mut rng).await.unwrap();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].class, GroundTruth::Defective);
    assert!(samples[0].key.starts_with("Test/Defective/"));
    assert_eq!(samples[1].class, GroundTruth::NonDefective);
    assert!(samples[1].key.starts_with("Test/Non-Defective/"));
}

#[tokio::test]
async fn sample_fails_on_empty_prefix() {
    let store = MemoryStore::default().put("Test/Defective/d1.jpg", "Defective");
    let evaluator = Evaluator::new(store, EchoEndpoint::default(), config(FailurePolicy::Record));
    let mut rng = StdRng::seed_from_u64(7);

    assert!(matches!(
        evaluator.sample(&mut rng).await,
        Err(EvalError::EmptyListing { .. })
    ));
}
