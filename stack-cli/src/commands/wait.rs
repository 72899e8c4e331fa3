use crate::app::CliApp;
use anyhow::{Context, Result};
use stack_core::container::ServiceStatus;
use std::time::Duration;
use tracing::info;

/// 等待服务就绪
pub async fn run_wait(
    app: &CliApp,
    project: Option<String>,
    services: Vec<String>,
    timeout_secs: Option<u64>,
    target: Option<ServiceStatus>,
) -> Result<()> {
    let project = app.resolve_project(project)?;

    let mut wait_config = app.config.to_wait_config(&project, &services)?;
    if let Some(secs) = timeout_secs {
        wait_config = wait_config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(target) = target {
        wait_config = wait_config.with_target(target);
    }
    wait_config.validate()?;

    info!(
        "⏳ 等待服务就绪: {} (项目 {}, 目标 {})",
        wait_config.required_services.join(", "),
        project,
        wait_config.target_status.display_name()
    );
    let status = app
        .orchestrator
        .wait_for_services(&wait_config)
        .await
        .context("服务未能就绪")?;
    info!("✅ 全部服务已达到 {} 状态", status.display_name());
    Ok(())
}
