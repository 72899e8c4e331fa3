use crate::app::CliApp;
use anyhow::{Context, Result};
use stack_core::container::manifest;
use tracing::{info, warn};

/// 检查编排命令与编排文件
pub async fn run_doctor(app: &CliApp) -> Result<()> {
    info!("🩺 环境检查");
    info!("   栈名: {}", app.stack_name());

    let dialect = app
        .orchestrator
        .check_prerequisites()
        .await
        .context("编排命令不可用")?;
    info!("   ✅ 编排命令: {}", dialect.display_name());

    let files = app.config.resolved_compose_files();
    manifest::ensure_exists(&files).context("编排文件检查失败")?;
    for file in &files {
        info!("   ✅ 编排文件: {}", file.display());
    }

    match manifest::service_names(&files, &app.config.stack.profiles) {
        Ok(services) if services.is_empty() => warn!("   ⚠️  编排文件中没有声明服务"),
        Ok(services) => info!("   📋 声明的服务: {}", services.join(", ")),
        Err(e) => warn!("   ⚠️  无法解析编排文件: {}", e),
    }

    let state_file = app.state_file();
    if state_file.exists() {
        info!("   📄 状态文件: {} (存在)", state_file.display());
    } else {
        info!("   📄 状态文件: {} (不存在)", state_file.display());
    }

    info!("🎉 检查通过");
    Ok(())
}
