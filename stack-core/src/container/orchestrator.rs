use super::command::{
    build_down_args, build_force_remove_args, build_logs_args, build_lookup_by_label_args,
    build_lookup_by_name_args, build_network_list_args, build_ps_args, build_up_args,
};
use super::dialect::{ComposeDialect, DialectDetector};
use super::parser::{parse_lines, parse_service_listing};
use super::readiness::{ReadinessPoller, ServiceLister};
use super::types::{LogsConfig, ServiceInfo, ServiceStatus, StackState, StartConfig, WaitConfig};
use crate::clock::{Clock, SystemClock};
use crate::constants::{compose, timeout};
use crate::runner::{CommandOutput, CommandRequest, CommandRunner, ProcessRunner};
use crate::{Result, StackError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 编排栈管理器
///
/// 负责拼装并执行 up / down / ps / logs 命令，解析输出；
/// 不同实例之间不共享任何可变状态，栈之间只靠项目名隔离。
pub struct StackOrchestrator {
    runner: Arc<dyn CommandRunner>,
    detector: DialectDetector,
    clock: Arc<dyn Clock>,
    poller: ReadinessPoller,
    command_timeout: Duration,
    remove_volumes: bool,
}

impl StackOrchestrator {
    pub fn new(runner: Arc<dyn CommandRunner>, clock: Arc<dyn Clock>) -> Self {
        Self {
            detector: DialectDetector::new(runner.clone()),
            poller: ReadinessPoller::new(clock.clone()),
            runner,
            clock,
            command_timeout: Duration::from_secs(timeout::COMMAND_TIMEOUT),
            remove_volumes: true,
        }
    }

    /// 使用真实进程和真实时钟
    pub fn system() -> Self {
        Self::new(Arc::new(ProcessRunner::new()), Arc::new(SystemClock))
    }

    /// 指定方言，跳过探测
    pub fn with_dialect(mut self, dialect: ComposeDialect) -> Self {
        self.detector = DialectDetector::with_dialect(self.runner.clone(), dialect);
        self
    }

    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn with_remove_volumes(mut self, remove_volumes: bool) -> Self {
        self.remove_volumes = remove_volumes;
        self
    }

    pub fn detector(&self) -> &DialectDetector {
        &self.detector
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// 检查 docker 是否安装以及编排命令是否可用
    pub async fn check_prerequisites(&self) -> Result<ComposeDialect> {
        if which::which(compose::DOCKER_PROGRAM).is_err() {
            warn!("docker 不在 PATH 中，尝试独立的 docker-compose");
        }
        self.detector.validate().await
    }

    /// 启动编排栈
    pub async fn start(&self, config: &StartConfig) -> Result<StackState> {
        let prefix = self.detector.detect().await?;
        let request = CommandRequest::new(build_up_args(&prefix, config))
            .with_working_dir(config.working_dir.as_deref())
            .with_env(&config.environment)
            .with_timeout(self.command_timeout);

        info!(
            "启动编排栈 {} (项目 {})",
            config.config_name, config.project_name
        );
        let output = self.runner.execute(&request).await?;

        if !output.is_success() {
            error!(
                "启动编排栈失败 (项目 {}): {}",
                config.project_name,
                output.stderr().trim()
            );
            return Err(StackError::StartFailed {
                stack: config.config_name.clone(),
                project: config.project_name.clone(),
                exit_code: output.exit_code(),
                stderr: output.stderr().trim().to_string(),
            });
        }

        let mut state = self
            .snapshot(&config.config_name, &config.project_name)
            .await;
        state.started_at = Some(self.clock.wall_time());
        Ok(state)
    }

    /// 停止并删除编排栈（含孤儿容器）
    pub async fn stop(&self, project_name: &str) -> Result<()> {
        let prefix = self.detector.detect().await?;
        let args = build_down_args(&prefix, project_name, self.remove_volumes);

        info!("停止编排栈 (项目 {})", project_name);
        self.run_checked(args).await?;
        Ok(())
    }

    /// 等待服务就绪
    pub async fn wait_for_services(&self, config: &WaitConfig) -> Result<ServiceStatus> {
        self.poller.wait_for(self, config).await
    }

    /// 采集日志，返回 stdout 与 stderr 的合并内容
    ///
    /// `follow` 模式下命令不会自行退出，到达命令超时后返回此前收到的内容。
    pub async fn capture_logs(&self, project_name: &str, logs: &LogsConfig) -> Result<String> {
        let prefix = self.detector.detect().await?;
        let args = build_logs_args(&prefix, project_name, logs);
        if !logs.follow {
            let output = self.run_checked(args).await?;
            return Ok(output.combined());
        }

        let request = CommandRequest::new(args)
            .with_timeout(self.command_timeout)
            .with_output_on_timeout();
        let output = self.runner.execute(&request).await?;
        if output.timed_out() {
            debug!("持续输出日志到达时限 {:?} (项目 {})", self.command_timeout, project_name);
        } else if !output.is_success() {
            return Err(StackError::command_failed(
                request.display(),
                output.exit_code(),
                output.stderr(),
            ));
        }
        Ok(output.combined())
    }

    /// 列出项目的服务及其容器信息
    pub async fn list_services(&self, project_name: &str) -> Result<BTreeMap<String, ServiceInfo>> {
        let prefix = self.detector.detect().await?;
        let output = self
            .run_checked(build_ps_args(&prefix, project_name))
            .await?;
        Ok(parse_service_listing(output.stdout()))
    }

    /// 列出项目创建的网络
    pub async fn list_networks(&self, project_name: &str) -> Result<Vec<String>> {
        let output = self
            .run_checked(build_network_list_args(project_name))
            .await?;
        Ok(parse_lines(output.stdout()))
    }

    /// 重新读取服务和网络，生成当前状态快照；查询失败时对应部分留空
    pub async fn snapshot(&self, config_name: &str, project_name: &str) -> StackState {
        let mut state = StackState::new(config_name, project_name);

        match self.list_services(project_name).await {
            Ok(services) => state.services = services,
            Err(e) => warn!("获取服务列表失败 (项目 {}): {}", project_name, e),
        }
        match self.list_networks(project_name).await {
            Ok(networks) => state.networks = networks,
            Err(e) => debug!("获取网络列表失败 (项目 {}): {}", project_name, e),
        }

        state
    }

    /// 强制删除容器名包含项目名的所有容器，返回删除数量
    pub async fn force_remove_by_name(&self, project_name: &str) -> Result<usize> {
        self.force_remove(build_lookup_by_name_args(project_name), project_name)
            .await
    }

    /// 强制删除带有该项目标签的所有容器，返回删除数量
    pub async fn force_remove_by_label(&self, project_name: &str) -> Result<usize> {
        self.force_remove(build_lookup_by_label_args(project_name), project_name)
            .await
    }

    async fn force_remove(&self, lookup: Vec<String>, project_name: &str) -> Result<usize> {
        let output = self.run_checked(lookup).await?;
        let ids = parse_lines(output.stdout());
        if ids.is_empty() {
            debug!("没有需要删除的容器 (项目 {})", project_name);
            return Ok(0);
        }

        let request = CommandRequest::new(build_force_remove_args(&ids))
            .with_timeout(self.command_timeout);
        let output = self.runner.execute(&request).await?;

        // 容器已不存在不算失败
        if !output.is_success()
            && !output
                .stderr()
                .to_lowercase()
                .contains(compose::NO_SUCH_CONTAINER)
        {
            return Err(StackError::command_failed(
                request.display(),
                output.exit_code(),
                output.stderr(),
            ));
        }

        info!("已强制删除 {} 个容器 (项目 {})", ids.len(), project_name);
        Ok(ids.len())
    }

    async fn run_checked(&self, args: Vec<String>) -> Result<CommandOutput> {
        let request = CommandRequest::new(args).with_timeout(self.command_timeout);
        let output = self.runner.execute(&request).await?;

        if !output.is_success() {
            return Err(StackError::command_failed(
                request.display(),
                output.exit_code(),
                output.stderr(),
            ));
        }
        Ok(output)
    }
}

#[async_trait]
impl ServiceLister for StackOrchestrator {
    async fn list_services(&self, project_name: &str) -> Result<BTreeMap<String, ServiceInfo>> {
        StackOrchestrator::list_services(self, project_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::container::PortMapping;
    use crate::test_support::{Scripted, ScriptedRunner};

    const WEB_LISTING: &str = r#"{"ID":"c0ffee","Name":"demo-web-1","Service":"web","State":"running","Status":"Up 2 seconds","Ports":"0.0.0.0:8080->80/tcp"}"#;

    fn orchestrator(runner: Arc<ScriptedRunner>) -> StackOrchestrator {
        StackOrchestrator::new(runner, Arc::new(ManualClock::default()))
    }

    fn plugin_runner() -> Arc<ScriptedRunner> {
        let runner = Arc::new(ScriptedRunner::new());
        runner.ok("docker compose version", "Docker Compose version v2.24.0");
        runner
    }

    #[tokio::test]
    async fn test_start_then_wait_then_state() {
        let runner = plugin_runner();
        runner.ok("up -d", "");
        runner.ok("ps --all --format json", WEB_LISTING);
        runner.ok("network ls", "demo_default\n");

        let orchestrator = orchestrator(runner.clone());
        let config = StartConfig::new("demo", "demo")
            .compose_file("a.yml")
            .compose_file("b.yml")
            .env("IMAGE_TAG", "latest");

        let state = orchestrator.start(&config).await.unwrap();
        assert_eq!(state.project_name, "demo");
        assert_eq!(state.networks, vec!["demo_default"]);
        assert!(state.started_at.is_some());

        let up = runner
            .requests()
            .into_iter()
            .find(|r| r.display().contains("up -d"))
            .unwrap();
        assert_eq!(
            up.display(),
            "docker compose -f a.yml -f b.yml -p demo up -d"
        );
        assert_eq!(up.env.get("IMAGE_TAG").map(String::as_str), Some("latest"));

        let wait = WaitConfig::new("demo", ["web"])
            .with_timeout(Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(500));
        let status = orchestrator.wait_for_services(&wait).await.unwrap();
        assert_eq!(status, ServiceStatus::Running);

        assert_eq!(
            state.service("web").unwrap().published_ports(),
            &[PortMapping::tcp(8080, 80)]
        );
    }

    #[tokio::test]
    async fn test_start_failure_includes_stderr() {
        let runner = plugin_runner();
        runner.fail("up -d", 1, "service \"web\" refers to undefined network\n");

        let orchestrator = orchestrator(runner);
        let config = StartConfig::new("demo", "demo-p").compose_file("a.yml");

        match orchestrator.start(&config).await {
            Err(StackError::StartFailed {
                stack,
                project,
                exit_code,
                stderr,
            }) => {
                assert_eq!(stack, "demo");
                assert_eq!(project, "demo-p");
                assert_eq!(exit_code, 1);
                assert!(stderr.contains("undefined network"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_survives_listing_failure() {
        let runner = plugin_runner();
        runner.ok("up -d", "");
        runner.fail("ps --all", 1, "boom");
        runner.on("network ls", Scripted::LaunchFailure);

        let state = orchestrator(runner)
            .start(&StartConfig::new("demo", "demo").compose_file("a.yml"))
            .await
            .unwrap();
        assert!(state.services.is_empty());
        assert!(state.networks.is_empty());
    }

    #[tokio::test]
    async fn test_stop_surfaces_failures() {
        let runner = plugin_runner();
        runner.fail("down", 1, "permission denied");

        let result = orchestrator(runner.clone()).stop("demo").await;
        assert!(matches!(result, Err(StackError::CommandFailed { .. })));
        assert_eq!(runner.count("-p demo down --remove-orphans --volumes"), 1);
    }

    #[tokio::test]
    async fn test_capture_logs_combines_streams() {
        let runner = plugin_runner();
        runner.on(
            "logs --no-color",
            Scripted::Output(CommandOutput::new(0, "web-1 | listening", "warning: x")),
        );

        let logs = orchestrator(runner.clone())
            .capture_logs("demo", &LogsConfig::tail(20).with_services(["web"]))
            .await
            .unwrap();
        assert_eq!(logs, "web-1 | listening\nwarning: x");
        assert_eq!(
            runner.count("docker compose -p demo logs --no-color --tail 20 web"),
            1
        );
    }

    #[tokio::test]
    async fn test_follow_logs_return_output_received_before_deadline() {
        let runner = plugin_runner();
        runner.on(
            "logs --no-color",
            Scripted::Output(CommandOutput::interrupted("web-1 | listening\n", "")),
        );

        let logs = orchestrator(runner.clone())
            .with_command_timeout(Duration::from_millis(300))
            .capture_logs("demo", &LogsConfig::tail(5).with_follow(true))
            .await
            .unwrap();
        assert_eq!(logs, "web-1 | listening\n");

        let request = runner
            .requests()
            .into_iter()
            .find(|r| r.display().contains("--follow"))
            .unwrap();
        assert!(request.keep_output_on_timeout);
        assert_eq!(request.timeout, Some(Duration::from_millis(300)));
    }

    #[tokio::test]
    async fn test_follow_logs_failure_is_command_failed() {
        let runner = plugin_runner();
        runner.fail("logs --no-color", 1, "no such project");

        let result = orchestrator(runner)
            .capture_logs("demo", &LogsConfig::tail(5).with_follow(true))
            .await;
        assert!(matches!(result, Err(StackError::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn test_plain_logs_timeout_is_an_error() {
        let runner = plugin_runner();
        runner.on("logs --no-color", Scripted::Timeout);

        let result = orchestrator(runner.clone())
            .capture_logs("demo", &LogsConfig::tail(5))
            .await;
        assert!(matches!(result, Err(StackError::CommandTimeout { .. })));
        assert!(!runner.requests().iter().any(|r| r.keep_output_on_timeout));
    }

    #[tokio::test]
    async fn test_force_remove_skips_when_nothing_found() {
        let runner = plugin_runner();
        runner.ok("docker ps -aq --filter name=demo", "");

        let removed = orchestrator(runner.clone())
            .force_remove_by_name("demo")
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(runner.count("docker rm"), 0);
    }

    #[tokio::test]
    async fn test_force_remove_treats_missing_container_as_success() {
        let runner = plugin_runner();
        runner.ok("label=com.docker.compose.project=demo", "aaa\nbbb\n");
        runner.fail("docker rm -f -v aaa bbb", 1, "Error: No such container: bbb");

        let removed = orchestrator(runner)
            .force_remove_by_label("demo")
            .await
            .unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_force_remove_reports_other_failures() {
        let runner = plugin_runner();
        runner.ok("docker ps -aq", "aaa\n");
        runner.fail("docker rm", 1, "permission denied");

        let result = orchestrator(runner).force_remove_by_name("demo").await;
        assert!(matches!(result, Err(StackError::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn test_preset_dialect_used_for_commands() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.ok("ps --all", WEB_LISTING);

        let orchestrator = orchestrator(runner.clone()).with_dialect(ComposeDialect::Standalone);
        let services = orchestrator.list_services("demo").await.unwrap();
        assert!(services.contains_key("web"));
        assert_eq!(runner.count("version"), 0);
        assert_eq!(
            runner.calls(),
            vec!["docker-compose -p demo ps --all --format json"]
        );
    }

    #[tokio::test]
    async fn test_unavailable_tool_fails_every_operation() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.on("version", Scripted::LaunchFailure);

        let orchestrator = orchestrator(runner);
        assert!(matches!(
            orchestrator.stop("demo").await,
            Err(StackError::CommandUnavailable { .. })
        ));
        assert!(matches!(
            orchestrator.list_services("demo").await,
            Err(StackError::CommandUnavailable { .. })
        ));
    }
}
