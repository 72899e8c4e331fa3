use crate::StackError;
use crate::container::StackOrchestrator;
use crate::state::StateLayout;
use std::fmt;
use tracing::{info, warn};

/// 分层清理的各个步骤，按声明顺序执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupStep {
    GracefulStop,
    RemoveByName,
    RemoveByLabel,
    DeleteStateFiles,
}

impl CleanupStep {
    pub const ORDER: [CleanupStep; 4] = [
        CleanupStep::GracefulStop,
        CleanupStep::RemoveByName,
        CleanupStep::RemoveByLabel,
        CleanupStep::DeleteStateFiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupStep::GracefulStop => "graceful-stop",
            CleanupStep::RemoveByName => "remove-by-name",
            CleanupStep::RemoveByLabel => "remove-by-label",
            CleanupStep::DeleteStateFiles => "delete-state-files",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CleanupStep::GracefulStop => "停止编排栈",
            CleanupStep::RemoveByName => "按名称强制删除容器",
            CleanupStep::RemoveByLabel => "按标签强制删除容器",
            CleanupStep::DeleteStateFiles => "删除状态文件",
        }
    }
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 单个清理步骤的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: CleanupStep,
    pub succeeded: bool,
    pub detail: String,
}

/// 清理结果汇总
#[derive(Debug, Default)]
pub struct TeardownReport {
    project_name: String,
    steps: Vec<StepOutcome>,
    last_failure: Option<StackError>,
}

impl TeardownReport {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..Default::default()
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn steps(&self) -> &[StepOutcome] {
        &self.steps
    }

    /// 没有执行任何步骤（未启动、已清理或非本进程管理的栈）
    pub fn is_skipped(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.last_failure.is_none()
    }

    pub fn failure_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.succeeded).count()
    }

    /// 最后一次失败
    pub fn last_failure(&self) -> Option<&StackError> {
        self.last_failure.as_ref()
    }

    pub fn outcome(&self, step: CleanupStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step)
    }

    fn record_success(&mut self, step: CleanupStep, detail: String) {
        info!("✅ {}: {}", step.display_name(), detail);
        self.steps.push(StepOutcome {
            step,
            succeeded: true,
            detail,
        });
    }

    fn record_failure(&mut self, step: CleanupStep, error: StackError) {
        let failure = StackError::cleanup(step.as_str(), &self.project_name, error.to_string());
        warn!("⚠️ {}", failure);
        self.steps.push(StepOutcome {
            step,
            succeeded: false,
            detail: error.to_string(),
        });
        self.last_failure = Some(failure);
    }
}

/// 按顺序执行全部清理步骤
///
/// 每一步独立执行，前一步失败不影响后续步骤；失败只记录日志并保留最后一次，
/// 不向调用方返回错误。
pub async fn run_layered_teardown(
    orchestrator: &StackOrchestrator,
    layout: &StateLayout,
    stack_name: &str,
    project_name: &str,
) -> TeardownReport {
    let mut report = TeardownReport::new(project_name);
    info!("开始清理编排栈 {} (项目 {})", stack_name, project_name);

    for step in CleanupStep::ORDER {
        let result = match step {
            CleanupStep::GracefulStop => orchestrator
                .stop(project_name)
                .await
                .map(|_| "已停止".to_string()),
            CleanupStep::RemoveByName => orchestrator
                .force_remove_by_name(project_name)
                .await
                .map(|count| format!("删除 {count} 个容器")),
            CleanupStep::RemoveByLabel => orchestrator
                .force_remove_by_label(project_name)
                .await
                .map(|count| format!("删除 {count} 个容器")),
            CleanupStep::DeleteStateFiles => layout
                .remove_matching(stack_name, project_name)
                .map(|paths| format!("删除 {} 个状态文件", paths.len())),
        };

        match result {
            Ok(detail) => report.record_success(step, detail),
            Err(e) => report.record_failure(step, e),
        }
    }

    if report.is_clean() {
        info!("编排栈清理完成 (项目 {})", project_name);
    } else {
        warn!(
            "编排栈清理完成，{} 个步骤失败 (项目 {})",
            report.failure_count(),
            project_name
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::{Scripted, ScriptedRunner};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn orchestrator(runner: Arc<ScriptedRunner>) -> StackOrchestrator {
        StackOrchestrator::new(runner, Arc::new(ManualClock::default()))
    }

    fn plugin_runner() -> Arc<ScriptedRunner> {
        let runner = Arc::new(ScriptedRunner::new());
        runner.ok("docker compose version", "Docker Compose version v2.24.0");
        runner
    }

    #[tokio::test]
    async fn test_failing_layers_do_not_stop_later_layers() {
        let dir = tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        fs::create_dir_all(layout.state_dir()).unwrap();
        fs::write(layout.state_file("orders"), "{}").unwrap();

        let runner = plugin_runner();
        runner.fail("down --remove-orphans", 1, "daemon not responding");
        runner.fail("--filter name=", 1, "permission denied");
        runner.ok("--filter label=", "abc123\n");
        runner.ok("rm -f -v", "abc123\n");

        let report =
            run_layered_teardown(&orchestrator(runner.clone()), &layout, "orders", "orders-it-1")
                .await;

        assert_eq!(report.steps().len(), 4);
        assert_eq!(report.failure_count(), 2);
        assert!(!report.outcome(CleanupStep::GracefulStop).unwrap().succeeded);
        assert!(!report.outcome(CleanupStep::RemoveByName).unwrap().succeeded);
        assert!(report.outcome(CleanupStep::RemoveByLabel).unwrap().succeeded);
        assert!(report.outcome(CleanupStep::DeleteStateFiles).unwrap().succeeded);
        assert!(!layout.state_file("orders").exists());

        // 保留的是最后一次失败
        match report.last_failure() {
            Some(StackError::Cleanup { step, project, .. }) => {
                assert_eq!(step, "remove-by-name");
                assert_eq!(project, "orders-it-1");
            }
            other => panic!("unexpected failure: {other:?}"),
        }

        let down = runner.position("down --remove-orphans").unwrap();
        let by_name = runner.position("--filter name=").unwrap();
        let by_label = runner.position("--filter label=").unwrap();
        let removal = runner.position("rm -f -v abc123").unwrap();
        assert!(down < by_name && by_name < by_label && by_label < removal);
    }

    #[tokio::test]
    async fn test_clean_run_on_missing_resources() {
        let dir = tempdir().unwrap();
        let layout = StateLayout::new(dir.path());

        let runner = plugin_runner();
        runner.ok("--filter", "");

        let report =
            run_layered_teardown(&orchestrator(runner.clone()), &layout, "orders", "orders-it-1")
                .await;

        assert!(report.is_clean());
        assert_eq!(report.steps().len(), 4);
        assert_eq!(runner.count("rm -f"), 0);
    }

    #[tokio::test]
    async fn test_unavailable_tool_still_deletes_state() {
        let dir = tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        fs::create_dir_all(layout.state_dir()).unwrap();
        fs::write(layout.state_file("orders"), "{}").unwrap();

        let runner = Arc::new(ScriptedRunner::new());
        runner.on("version", Scripted::LaunchFailure);
        runner.on("docker ps", Scripted::LaunchFailure);

        let report =
            run_layered_teardown(&orchestrator(runner), &layout, "orders", "orders-it-1").await;

        assert_eq!(report.failure_count(), 3);
        assert!(report.outcome(CleanupStep::DeleteStateFiles).unwrap().succeeded);
        assert!(!layout.state_file("orders").exists());
    }

    #[tokio::test]
    async fn test_timed_out_removal_is_a_failed_step() {
        let dir = tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        fs::create_dir_all(layout.state_dir()).unwrap();
        fs::write(layout.state_file("orders"), "{}").unwrap();
        fs::write(layout.project_state_file("orders", "orders-it-1"), "{}").unwrap();
        fs::write(layout.state_file("orders-api"), "{}").unwrap();

        let runner = plugin_runner();
        runner.ok("--filter name=", "");
        runner.ok("--filter label=", "abc123\n");
        runner.on("rm -f -v", Scripted::Timeout);

        let report =
            run_layered_teardown(&orchestrator(runner), &layout, "orders", "orders-it-1").await;

        assert_eq!(report.failure_count(), 1);
        assert!(!report.outcome(CleanupStep::RemoveByLabel).unwrap().succeeded);
        assert!(report.outcome(CleanupStep::DeleteStateFiles).unwrap().succeeded);
        assert!(!layout.state_file("orders").exists());
        assert!(!layout.project_state_file("orders", "orders-it-1").exists());
        assert!(layout.state_file("orders-api").exists());
    }
}
