use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use survival::{ModelConfig, PatientRecord, SurvivalPredictor, record::FEATURE_NAMES};

#[derive(Parser, Debug)]
#[command(name = "survival-predict", about = "加载存活预测模型并对单条记录打分")]
struct Args {
    /// 模型文件路径（JSON 格式的梯度提升树）
    #[arg(long, default_value = "./model/model_grad_boost_02.json")]
    model: PathBuf,

    /// 待预测的记录（JSON 文件）；不提供时使用内置示例
    #[arg(long)]
    record: Option<PathBuf>,

    /// 同时打印组装后的特征向量
    #[arg(long, default_value_t = false)]
    show_features: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let predictor = SurvivalPredictor::load(&ModelConfig {
        model_path: args.model,
    })?;

    let record = match &args.record {
        Some(path) => load_record(path)?,
        None => PatientRecord::example(),
    };

    let assessment = predictor.assess(&record).context("预测失败")?;

    if args.show_features {
        println!("特征向量：");
        for (name, value) in FEATURE_NAMES.iter().zip(assessment.features.as_array()) {
            println!("  {:<22} {}", name, value);
        }
    }

    println!(
        "存活概率：{:.4}（{}%），置信度：{}，预测：{}",
        assessment.probability, assessment.score, assessment.bucket, assessment.prediction
    );
    println!("{}", serde_json::to_string(&assessment.response())?);

    Ok(())
}

fn load_record(path: &Path) -> Result<PatientRecord> {
    let file = File::open(path).with_context(|| format!("无法读取记录文件 {}", path.display()))?;
    let record: PatientRecord = serde_json::from_reader(file)
        .with_context(|| format!("解析记录文件失败 {}", path.display()))?;
    Ok(record)
}
