use anyhow::{Context, Result};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};
use survival::{ModelConfig, SurvivalPredictor};
use survival_server::routes;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    name = "survival-server",
    version,
    about = "通过 HTTP 提供乳腺癌存活预测服务"
)]
struct Args {
    /// 监听地址
    #[arg(long, env = "SURVIVAL_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

    /// 梯度提升树模型文件（JSON），启动时加载一次
    #[arg(long, env = "SURVIVAL_MODEL", default_value = "./model/model_grad_boost_02.json")]
    model: PathBuf,
}

// 单线程运行时：请求逐个处理，模型只读。
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let predictor = SurvivalPredictor::load(&ModelConfig {
        model_path: args.model,
    })
    .context("加载模型失败")?;

    let (addr, server) = warp::serve(routes(predictor)).try_bind_with_graceful_shutdown(
        args.bind,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )
    .context("绑定监听地址失败")?;
    info!("正在监听 http://{addr}");

    server.await;
    info!("服务已关闭");

    Ok(())
}
