use crate::app::CliApp;
use anyhow::{Context, Result};
use tracing::debug;

/// 输出服务日志到 stdout
pub async fn run_logs(
    app: &CliApp,
    project: Option<String>,
    services: Vec<String>,
    tail: Option<u32>,
    follow: bool,
) -> Result<()> {
    let project = app.resolve_project(project)?;

    let mut logs_config = app.config.logs_config(&services).with_follow(follow);
    if let Some(tail) = tail {
        logs_config.tail_lines = tail;
    }

    debug!("采集日志 (项目 {}): {:?}", project, logs_config);
    let output = app
        .orchestrator
        .capture_logs(&project, &logs_config)
        .await
        .with_context(|| format!("采集日志失败 (项目 {project})"))?;
    println!("{output}");
    Ok(())
}
