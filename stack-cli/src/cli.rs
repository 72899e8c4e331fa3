use clap::{Parser, Subcommand};
use stack_core::container::ServiceStatus;
use std::path::PathBuf;

/// Stack CLI - 测试环境多容器编排栈驱动工具
#[derive(Parser, Debug)]
#[command(name = "stack-cli")]
#[command(version, about = "测试环境多容器编排栈驱动工具")]
#[command(
    long_about = "启动编排栈、等待服务就绪、采集日志并分层清理；通过状态文件与环境变量把运行中的栈交给测试进程"
)]
pub struct Cli {
    /// 配置文件路径（默认依次查找 stack.toml、.stack.toml）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// 生成默认配置文件
    Init {
        /// 如果配置文件已存在，强制覆盖
        #[arg(long)]
        force: bool,
        /// 栈名（默认使用当前目录名）
        #[arg(long)]
        name: Option<String>,
    },
    /// 检查 docker 与编排命令是否可用
    Doctor,
    /// 启动编排栈并等待就绪，写入状态文件
    Up {
        /// 项目名（默认自动生成）
        #[arg(long)]
        project: Option<String>,
        /// 输出交给测试进程的 export 语句
        #[arg(long)]
        print_env: bool,
        /// 启动后不等待服务就绪
        #[arg(long)]
        no_wait: bool,
    },
    /// 等待服务就绪
    Wait {
        /// 项目名（默认读取状态文件）
        #[arg(long)]
        project: Option<String>,
        /// 需要等待的服务，可重复指定
        #[arg(long = "service")]
        services: Vec<String>,
        /// 超时时间（秒）
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// 目标状态：running 或 healthy
        #[arg(long)]
        target: Option<ServiceStatus>,
    },
    /// 列出服务状态与端口
    Ps {
        /// 项目名（默认读取状态文件）
        #[arg(long)]
        project: Option<String>,
    },
    /// 输出服务日志
    Logs {
        /// 项目名（默认读取状态文件）
        #[arg(long)]
        project: Option<String>,
        /// 只输出指定服务，可重复指定
        #[arg(long = "service")]
        services: Vec<String>,
        /// 尾部行数
        #[arg(long)]
        tail: Option<u32>,
        /// 持续输出（受命令超时限制）
        #[arg(long)]
        follow: bool,
    },
    /// 分层清理编排栈并删除状态文件
    Down {
        /// 项目名（默认读取状态文件）
        #[arg(long)]
        project: Option<String>,
    },
    /// 输出状态文件内容
    State,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_up() {
        let cli = Cli::try_parse_from(["stack-cli", "-c", "it.toml", "-v", "up", "--print-env"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("it.toml")));
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Commands::Up {
                project: None,
                print_env: true,
                no_wait: false,
            }
        );
    }

    #[test]
    fn test_parse_wait_with_repeated_services() {
        let cli = Cli::try_parse_from([
            "stack-cli",
            "wait",
            "--service",
            "web",
            "--service",
            "db",
            "--timeout-secs",
            "30",
            "--target",
            "healthy",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Wait {
                project: None,
                services: vec!["web".to_string(), "db".to_string()],
                timeout_secs: Some(30),
                target: Some(ServiceStatus::Healthy),
            }
        );
    }

    #[test]
    fn test_rejects_unknown_target() {
        assert!(Cli::try_parse_from(["stack-cli", "wait", "--target", "sleeping"]).is_err());
    }

    #[test]
    fn test_parse_logs_and_down() {
        let cli = Cli::try_parse_from([
            "stack-cli", "logs", "--project", "p1", "--tail", "50", "--follow",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Logs {
                project: Some("p1".to_string()),
                services: Vec::new(),
                tail: Some(50),
                follow: true,
            }
        );

        let cli = Cli::try_parse_from(["stack-cli", "down"]).unwrap();
        assert_eq!(cli.command, Commands::Down { project: None });
        assert_eq!(cli.config, None);
    }
}
