use anyhow::Result;
use clap::Parser;
use collect_responses::utils::logging;
use collect_responses::{App, CliArgs, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 解析参数，配置错误在调度前直接退出
    let config = Config::from_args(CliArgs::parse())?;

    // 初始化并运行应用
    let stats = App::initialize(config)?.run().await?;

    if stats.failed > 0 {
        tracing::warn!("⚠️ {} 条记录失败，重新运行即可续跑", stats.failed);
    }

    Ok(())
}
