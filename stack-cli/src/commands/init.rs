use anyhow::{Context, Result};
use stack_core::config::HarnessConfig;
use stack_core::constants::config;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 生成默认配置文件
pub fn run_init(config_path: Option<&Path>, force: bool, name: Option<String>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_FILE));

    if path.exists() && !force {
        warn!("⚠️  配置文件已存在: {}", path.display());
        info!("如果要重新生成，请使用 --force 参数");
        return Ok(());
    }

    let stack_name = name.unwrap_or_else(default_stack_name);
    HarnessConfig::write_template(&path, &stack_name)
        .with_context(|| format!("写入配置文件失败: {}", path.display()))?;

    info!("✅ 已创建配置文件: {}", path.display());
    info!("📝 接下来的步骤:");
    info!("   1️⃣  编辑 {} 中的 compose_files 与 [wait] services", path.display());
    info!("   2️⃣  运行 'stack-cli doctor' 检查环境");
    info!("   3️⃣  运行 'stack-cli up --print-env' 启动编排栈");
    Ok(())
}

/// 当前目录名，转为小写；无法获取时为 "stack"
fn default_stack_name() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().to_lowercase()))
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "stack".to_string())
}
