use clap::Parser;
use stack_cli::{Cli, CliApp, Commands, run_init, setup_logging};
use tracing::error;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 设置日志记录
    if let Err(e) = setup_logging(cli.verbose) {
        eprintln!("❌ 日志初始化失败: {e:#}");
        std::process::exit(1);
    }

    // `init` 命令是特例，它不需要预先加载配置
    if let Commands::Init { force, name } = &cli.command {
        if let Err(e) = run_init(cli.config.as_deref(), *force, name.clone()) {
            error!("❌ 初始化失败: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    let app = match CliApp::load(cli.config.as_deref()) {
        Ok(app) => app,
        Err(e) => {
            error!("❌ 应用初始化失败: {:#}", e);
            std::process::exit(1);
        }
    };

    // 运行命令
    if let Err(e) = app.run_command(cli.command).await {
        error!("❌ 操作失败: {:#}", e);
        std::process::exit(1);
    }
}
