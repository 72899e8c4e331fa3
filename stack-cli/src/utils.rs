use anyhow::{Context, Result};
use stack_core::container::{PortMapping, StackState};
use std::path::{Path, PathBuf};

/// # Stack CLI 日志系统
///
/// 库代码只使用 `tracing` 宏，日志配置由应用入口 `setup_logging()` 决定。
///
/// - `-v, --verbose`：DEBUG 级别
/// - `RUST_LOG`：标准的日志级别控制，优先于 `-v`
/// - `STACK_LOG_FILE`：设置后日志写入该文件（包含模块路径与行号）
///
/// ```bash
/// RUST_LOG=stack_core::container=debug stack-cli up
/// STACK_LOG_FILE=stack.log stack-cli down
/// ```
pub fn setup_logging(verbose: bool) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Ok(log_file) = std::env::var("STACK_LOG_FILE") {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("无法创建日志文件: {log_file}"))?;

        fmt()
            .with_env_filter(env_filter)
            .with_writer(file)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true)
            .init();
    } else {
        // 日志写 stderr，stdout 留给 export 语句和日志内容
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .without_time()
            .compact()
            .init();
    }
    Ok(())
}

/// 为库使用提供的简化日志初始化，已有全局订阅者时不做任何事
pub fn setup_minimal_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

/// `8080->80/tcp, 5353->53/udp`
pub fn format_ports(ports: &[PortMapping]) -> String {
    if ports.is_empty() {
        return "-".to_string();
    }
    ports
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// 生成交给测试进程的 export 语句，测试进程据此接管驱动进程启动的栈
pub fn handoff_exports(state: &StackState, compose_files: &[PathBuf], state_dir: &Path) -> Vec<String> {
    let files = compose_files
        .iter()
        .map(|f| f.display().to_string())
        .collect::<Vec<_>>()
        .join(",");

    vec![
        export_line("STACK_NAME", &state.config_name),
        export_line("STACK_PROJECT", &state.project_name),
        export_line("STACK_FILES", &files),
        export_line("STACK_STATE_DIR", &state_dir.display().to_string()),
        export_line("STACK_DELEGATE", "true"),
    ]
}

fn export_line(name: &str, value: &str) -> String {
    format!("export {name}='{}'", value.replace('\'', r"'\''"))
}
