use crate::app::CliApp;
use anyhow::Result;
use stack_core::extension::run_layered_teardown;
use tracing::{info, warn};

/// 分层清理编排栈，单个步骤失败只记录警告
pub async fn run_down(app: &CliApp, project: Option<String>) -> Result<()> {
    let project = app.resolve_project(project)?;

    info!("🧹 清理编排栈 {} (项目 {})", app.stack_name(), project);
    let report =
        run_layered_teardown(&app.orchestrator, &app.layout(), app.stack_name(), &project).await;

    for outcome in report.steps() {
        if outcome.succeeded {
            info!("   ✅ {}: {}", outcome.step.display_name(), outcome.detail);
        } else {
            warn!("   ❌ {}: {}", outcome.step.display_name(), outcome.detail);
        }
    }

    match report.last_failure() {
        Some(failure) => warn!("⚠️  清理完成，但有步骤失败: {}", failure),
        None => info!("✅ 清理完成"),
    }
    Ok(())
}
