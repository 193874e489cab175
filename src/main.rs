use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use no_llame_check::utils::logging;
use no_llame_check::{normalize, App, Config};

#[derive(Parser, Debug)]
#[command(name = "no_llame_check", version, about = "查询号码是否在「No llame」登记库中")]
struct Cli {
    /// TOML 配置文件
    #[arg(long, global = true, env = "NO_LLAME_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 查询一个或多个号码
    Check {
        #[arg(required = true)]
        numbers: Vec<String>,
        /// 跳过缓存读取
        #[arg(long)]
        ignore_cache: bool,
    },
    /// 只校验并归一化号码
    Validate { number: String },
    /// 缓存维护
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// 缓存状态
    Stats,
    /// 删除一个号码的缓存
    Clear { number: String },
    /// 清理过期记录
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::load(cli.config.as_deref())?;

    // 初始化日志
    logging::init(config.verbose_logging);

    if let Command::Validate { number } = &cli.command {
        let phone = normalize(number)?;
        println!("{}", serde_json::to_string_pretty(&phone)?);
        return Ok(());
    }

    // 初始化并运行应用
    let app = App::initialize(config).await?;

    tokio::select! {
        result = execute(&app, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("⚠️ 收到中断信号，放弃未完成的查询");
            Ok(())
        }
    }
}

async fn execute(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Check {
            numbers,
            ignore_cache,
        } => {
            let (responses, _tally) = app.run(&numbers, ignore_cache).await?;
            for response in &responses {
                println!("{}", serde_json::to_string(response)?);
            }
        }
        Command::Cache { action } => match action {
            CacheAction::Stats => {
                println!("{}", serde_json::to_string_pretty(&app.cache_stats().await)?);
            }
            CacheAction::Clear { number } => {
                let removed = app.cache_clear(&number).await?;
                println!("{}", serde_json::json!({ "removed": removed }));
            }
            CacheAction::Purge => {
                let purged = app.cache_purge().await;
                println!("{}", serde_json::json!({ "purged": purged }));
            }
        },
        Command::Validate { .. } => {}
    }
    Ok(())
}
