use crate::app::CliApp;
use crate::commands::ps::log_service_table;
use crate::utils::handoff_exports;
use anyhow::{Context, Result};
use stack_core::constants::logs;
use stack_core::container::{LogsConfig, manifest};
use stack_core::extension::run_layered_teardown;
use stack_core::state::write_state;
use tracing::{error, info, warn};

/// 启动编排栈、等待就绪并写入状态文件
pub async fn run_up(
    app: &CliApp,
    project: Option<String>,
    print_env: bool,
    no_wait: bool,
) -> Result<()> {
    let files = app.config.resolved_compose_files();
    manifest::ensure_exists(&files).context("编排文件检查失败")?;

    let project = match project {
        Some(project) => project,
        None => app.fresh_project_name()?,
    };

    // 启动前先确定等待配置，配置有误时不必启动
    let wait_config = if no_wait {
        None
    } else {
        Some(app.config.to_wait_config(&project, &[])?)
    };

    info!("🚀 启动编排栈 {} (项目 {})", app.stack_name(), project);
    let started = match app
        .orchestrator
        .start(&app.config.to_start_config(&project))
        .await
    {
        Ok(state) => state,
        Err(e) => {
            cleanup(app, &project).await;
            return Err(e).context("启动编排栈失败");
        }
    };

    if let Some(wait_config) = wait_config {
        info!(
            "⏳ 等待服务就绪: {} (目标 {}, 超时 {:?})",
            wait_config.required_services.join(", "),
            wait_config.target_status.display_name(),
            wait_config.timeout
        );
        if let Err(e) = app.orchestrator.wait_for_services(&wait_config).await {
            match app
                .orchestrator
                .capture_logs(&project, &LogsConfig::tail(logs::FAILURE_TAIL_LINES))
                .await
            {
                Ok(output) => error!("编排栈日志:\n{}", output),
                Err(log_err) => warn!("采集日志失败: {}", log_err),
            }
            cleanup(app, &project).await;
            return Err(e).context("服务未能就绪");
        }
    }

    let mut state = app.orchestrator.snapshot(app.stack_name(), &project).await;
    state.started_at = started.started_at;

    let state_file = app.state_file();
    write_state(&state, &state_file)
        .with_context(|| format!("写入状态文件失败: {}", state_file.display()))?;

    info!("✅ 编排栈已就绪 (项目 {})", project);
    log_service_table(&state.services);
    info!("📄 状态文件: {}", state_file.display());

    if print_env {
        for line in handoff_exports(&state, &files, &app.layout().state_dir()) {
            println!("{line}");
        }
    }
    Ok(())
}

async fn cleanup(app: &CliApp, project: &str) {
    let report =
        run_layered_teardown(&app.orchestrator, &app.layout(), app.stack_name(), project).await;
    if !report.is_clean() {
        warn!("⚠️  清理未完全成功，共 {} 个步骤失败", report.failure_count());
    }
}
