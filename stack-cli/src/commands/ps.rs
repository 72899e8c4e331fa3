use crate::app::CliApp;
use crate::utils::format_ports;
use anyhow::{Context, Result};
use stack_core::container::ServiceInfo;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// 列出服务状态
pub async fn run_ps(app: &CliApp, project: Option<String>) -> Result<()> {
    let project = app.resolve_project(project)?;
    let services = app
        .orchestrator
        .list_services(&project)
        .await
        .with_context(|| format!("获取服务状态失败 (项目 {project})"))?;

    info!("📊 项目 {} 的服务状态:", project);
    if services.is_empty() {
        warn!("   没有找到任何服务");
        return Ok(());
    }
    log_service_table(&services);
    Ok(())
}

pub(crate) fn log_service_table(services: &BTreeMap<String, ServiceInfo>) {
    for (name, info) in services {
        info!(
            "   {} {:<16} {:<10} {:<28} {}",
            status_icon(info),
            name,
            info.status().display_name(),
            info.container_name(),
            format_ports(info.published_ports())
        );
    }
}

fn status_icon(info: &ServiceInfo) -> &'static str {
    use stack_core::container::ServiceStatus;

    match info.status() {
        ServiceStatus::Healthy | ServiceStatus::Running => "🟢",
        ServiceStatus::Restarting => "🟡",
        ServiceStatus::Stopped => "🔴",
        ServiceStatus::Unknown => "⚪",
    }
}
