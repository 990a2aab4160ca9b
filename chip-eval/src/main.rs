use anyhow::{Context, Result};
use chip_eval::{
    AwsOptions, DEFAULT_BUCKET, DEFAULT_ENDPOINT, DEFAULT_KEY_PREFIX, EvalConfig, Evaluator,
    FailurePolicy, S3ObjectStore, SageMakerEndpoint,
};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OnError {
    /// 遇到第一个无法下载或推理的对象即中止
    Abort,
    /// 记录失败，不计入统计并继续
    Record,
}

impl From<OnError> for FailurePolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => FailurePolicy::Abort,
            OnError::Record => FailurePolicy::Record,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "chip-eval",
    version,
    about = "用已标注的测试图像评估薯片缺陷分类端点的准确率"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 存放已标注图像的存储桶
    #[arg(long, global = true, default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Defective/ 与 Non-Defective/ 目录所在的前缀
    #[arg(long, global = true, default_value = DEFAULT_KEY_PREFIX)]
    prefix: String,

    /// 推理端点名称
    #[arg(long, global = true, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// AWS 区域（默认取环境配置）
    #[arg(long, global = true)]
    region: Option<String>,

    /// AWS 共享配置中的 profile
    #[arg(long, global = true)]
    profile: Option<String>,

    /// 发送前先把图像写入临时文件
    #[arg(long, global = true, default_value_t = false)]
    stage_to_disk: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 评估全部图像并输出准确率
    Run {
        /// 失败处理策略，两个类别共用
        #[arg(long, value_enum, default_value_t = OnError::Record)]
        on_error: OnError,
    },
    /// 每个类别随机抽取一张图像打分
    Sample {
        /// 随机种子，便于复现抽样结果
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let aws = AwsOptions {
        region: cli.region.clone(),
        profile: cli.profile.clone(),
    }
    .load()
    .await;

    let mut config = EvalConfig {
        bucket: cli.bucket,
        key_prefix: cli.prefix,
        endpoint_name: cli.endpoint,
        stage_to_disk: cli.stage_to_disk,
        ..EvalConfig::default()
    };
    if let Command::Run { on_error } = cli.command {
        config.failure_policy = on_error.into();
    }

    let store = S3ObjectStore::from_config(&aws);
    let endpoint = SageMakerEndpoint::from_config(&aws, config.endpoint_name.clone());
    let evaluator = Evaluator::new(store, endpoint, config);

    match cli.command {
        Command::Run { .. } => run(&evaluator).await,
        Command::Sample { seed } => sample(&evaluator, seed).await,
    }
}

async fn run(evaluator: &Evaluator<S3ObjectStore, SageMakerEndpoint>) -> Result<()> {
    let outcome = evaluator.run().await.context("评估失败")?;

    println!("缺陷类已评估：{}", outcome.def_preds.len());
    println!("非缺陷类已评估：{}", outcome.non_def_preds.len());

    if !outcome.problem_files.is_empty() {
        println!("\n失败文件（{}）：", outcome.problem_files.len());
        for (name, err) in &outcome.problem_files {
            println!("  {name}: {err}");
        }
    }

    let report = outcome.report().context("无法计算准确率")?;
    println!(
        "\n正确数：缺陷类 {}/{}，非缺陷类 {}/{}",
        report.defective.correct,
        report.defective.total,
        report.non_defective.correct,
        report.non_defective.total
    );
    println!("总体准确率：    {:.4}", report.accuracy);
    println!("缺陷类准确率：  {:.4}", report.defective_accuracy);
    println!("非缺陷类准确率：{:.4}", report.non_defective_accuracy);

    Ok(())
}

async fn sample(
    evaluator: &Evaluator<S3ObjectStore, SageMakerEndpoint>,
    seed: Option<u64>,
) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(rand::thread_rng()).context("初始化随机数生成器失败")?,
    };

    for sample in evaluator.sample(&mut rng).await.context("抽样失败")? {
        println!(
            "{} [{}] => 预测 {}",
            sample.key, sample.class, sample.prediction.predicted_label
        );
        for (label, prob) in sample.prediction.distribution() {
            println!("  {:<20} {:.4}", label, prob);
        }
    }

    Ok(())
}
