use super::context::{LifecyclePhase, StackContext};
use super::reference::{LifecycleScope, StackReference, StackSource, derive_project_name};
use super::teardown::{TeardownReport, run_layered_teardown};
use crate::constants::{logs, properties as keys, timeout};
use crate::container::{
    LogsConfig, ServiceStatus, StackOrchestrator, StackState, StartConfig, WaitConfig, manifest,
};
use crate::properties::{self, StackProperties};
use crate::state::{read_state, write_state};
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 扩展的等待与诊断参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub target_status: ServiceStatus,
    pub failure_log_tail: u32,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(timeout::SERVICE_START_TIMEOUT),
            poll_interval: Duration::from_millis(timeout::SERVICE_CHECK_INTERVAL_MS),
            target_status: ServiceStatus::Running,
            failure_log_tail: logs::FAILURE_TAIL_LINES,
        }
    }
}

/// 测试进程使用的栈发现与清理扩展
///
/// `setup` 根据共享配置项启动栈（或接管驱动进程启动的栈），等待就绪并发布状态；
/// `teardown` 对本进程启动的栈执行分层清理，永不返回错误。
pub struct StackExtension {
    orchestrator: Arc<StackOrchestrator>,
    properties: Arc<StackProperties>,
    settings: ExtensionSettings,
}

impl StackExtension {
    pub fn new(orchestrator: Arc<StackOrchestrator>, properties: Arc<StackProperties>) -> Self {
        Self {
            orchestrator,
            properties,
            settings: ExtensionSettings::default(),
        }
    }

    /// 使用真实进程与进程级配置项
    pub fn system() -> Self {
        Self::new(Arc::new(StackOrchestrator::system()), properties::global())
    }

    pub fn with_settings(mut self, settings: ExtensionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn properties(&self) -> &StackProperties {
        &self.properties
    }

    pub fn reference(&self) -> Result<StackReference> {
        StackReference::from_properties(&self.properties)
    }

    /// 配置的生命周期范围是否为给定范围，测试框架据此决定在哪个钩子里调用
    pub fn manages(&self, scope: LifecycleScope) -> Result<bool> {
        Ok(self.reference()?.lifecycle == scope)
    }

    /// 为测试单元准备编排栈
    pub async fn setup(&self, test_unit: &str) -> Result<StackContext> {
        let reference = self.reference()?;
        match reference.resolve_source() {
            StackSource::Delegated => self.adopt(&reference, test_unit),
            StackSource::Managed {
                compose_files,
                env_files,
                profiles,
            } => {
                self.launch(&reference, test_unit, compose_files, env_files, profiles)
                    .await
            }
        }
    }

    /// 清理测试单元的编排栈，可重复调用
    pub async fn teardown(&self, ctx: &mut StackContext) -> TeardownReport {
        if ctx.phase() != LifecyclePhase::Running {
            debug!("项目 {} 无需清理 ({:?})", ctx.project_name(), ctx.phase());
            ctx.mark_torn_down();
            return TeardownReport::new(ctx.project_name());
        }

        let removed = self
            .properties
            .remove_prefix(&keys::published_key(ctx.stack_name(), ""));
        debug!("已移除 {} 个发布的配置项", removed);

        let report = if ctx.is_owned() {
            run_layered_teardown(
                &self.orchestrator,
                ctx.layout(),
                ctx.stack_name(),
                ctx.project_name(),
            )
            .await
        } else {
            info!(
                "编排栈 {} 由驱动进程管理，跳过清理 (项目 {})",
                ctx.stack_name(),
                ctx.project_name()
            );
            TeardownReport::new(ctx.project_name())
        };

        ctx.mark_torn_down();
        report
    }

    /// 接管驱动进程启动的栈：只读取状态文件，不启动也不清理
    fn adopt(&self, reference: &StackReference, test_unit: &str) -> Result<StackContext> {
        let layout = reference.state_layout();
        let state = read_state(&layout.state_file(&reference.stack_name))?;

        if let Some(expected) = &reference.project_name {
            if expected != &state.project_name {
                warn!(
                    "状态文件中的项目名 {} 与配置项 {} 不一致，以状态文件为准",
                    state.project_name, expected
                );
            }
        }

        let mut ctx = StackContext::new(
            test_unit,
            &reference.stack_name,
            &state.project_name,
            false,
            layout,
        );
        info!(
            "接管编排栈 {} (项目 {}), 共 {} 个服务",
            reference.stack_name,
            state.project_name,
            state.services.len()
        );
        self.publish(&ctx, &state);
        ctx.mark_running(state);
        Ok(ctx)
    }

    async fn launch(
        &self,
        reference: &StackReference,
        test_unit: &str,
        compose_files: Vec<PathBuf>,
        env_files: Vec<PathBuf>,
        profiles: Vec<String>,
    ) -> Result<StackContext> {
        manifest::ensure_exists(&compose_files)?;

        let stack_name = &reference.stack_name;
        let project_name = derive_project_name(
            stack_name,
            test_unit,
            self.orchestrator.clock().wall_time(),
        )?;
        let mut ctx = StackContext::new(
            test_unit,
            stack_name,
            &project_name,
            true,
            reference.state_layout(),
        );

        // 上次运行崩溃可能留下同名容器
        match self.orchestrator.force_remove_by_name(&project_name).await {
            Ok(0) => {}
            Ok(count) => info!("已清理 {} 个残留容器 (项目 {})", count, project_name),
            Err(e) => warn!("清理残留容器失败 (项目 {}): {}", project_name, e),
        }

        let mut start_config = StartConfig::new(stack_name, &project_name);
        for file in &compose_files {
            start_config = start_config.compose_file(file);
        }
        for env_file in env_files {
            start_config = start_config.env_file(env_file);
        }
        for profile in &profiles {
            start_config = start_config.profile(profile);
        }

        let started = match self.orchestrator.start(&start_config).await {
            Ok(state) => state,
            Err(e) => {
                error!("❌ 启动编排栈 {} 失败: {}", stack_name, e);
                self.cleanup_after_failure(&ctx).await;
                return Err(e);
            }
        };

        let required = self.required_services(reference, &compose_files, &profiles, &started);
        if required.is_empty() {
            warn!("没有需要等待的服务 (项目 {})", project_name);
        } else {
            let wait_config = WaitConfig::new(&project_name, required)
                .with_timeout(self.settings.timeout)
                .with_poll_interval(self.settings.poll_interval)
                .with_target(self.settings.target_status);

            if let Err(e) = self.orchestrator.wait_for_services(&wait_config).await {
                error!("❌ 编排栈 {} 未能就绪: {}", stack_name, e);
                self.dump_logs(&project_name).await;
                self.cleanup_after_failure(&ctx).await;
                return Err(e);
            }
        }

        let mut state = self.orchestrator.snapshot(stack_name, &project_name).await;
        state.started_at = started.started_at;

        if let Err(e) = write_state(&state, ctx.state_file()) {
            error!("❌ 写入状态文件失败: {}", e);
            self.cleanup_after_failure(&ctx).await;
            return Err(e);
        }

        self.publish(&ctx, &state);
        ctx.mark_running(state);
        info!(
            "✅ 编排栈 {} 已就绪 (项目 {}), 状态文件: {}",
            stack_name,
            project_name,
            ctx.state_file().display()
        );
        Ok(ctx)
    }

    /// 需要等待的服务：显式配置优先，其次为编排文件中在启用的 profile 下会启动的服务，最后为实际启动的服务
    fn required_services(
        &self,
        reference: &StackReference,
        compose_files: &[PathBuf],
        profiles: &[String],
        started: &StackState,
    ) -> Vec<String> {
        if !reference.wait_services.is_empty() {
            return reference.wait_services.clone();
        }

        match manifest::service_names(compose_files, profiles) {
            Ok(names) if !names.is_empty() => return names,
            Ok(_) => {}
            Err(e) => warn!("读取编排文件中的服务失败: {}", e),
        }

        started.services.keys().cloned().collect()
    }

    async fn dump_logs(&self, project_name: &str) {
        let logs_config = LogsConfig::tail(self.settings.failure_log_tail);
        match self
            .orchestrator
            .capture_logs(project_name, &logs_config)
            .await
        {
            Ok(output) => error!("编排栈日志 (项目 {}):\n{}", project_name, output),
            Err(e) => warn!("采集日志失败 (项目 {}): {}", project_name, e),
        }
    }

    async fn cleanup_after_failure(&self, ctx: &StackContext) {
        let report = run_layered_teardown(
            &self.orchestrator,
            ctx.layout(),
            ctx.stack_name(),
            ctx.project_name(),
        )
        .await;
        if let Some(failure) = report.last_failure() {
            warn!("失败后的清理未完全成功: {}", failure);
        }
    }

    /// 把项目名、状态文件、容器 ID 和端口发布为 `stack.<栈名>.*` 配置项
    fn publish(&self, ctx: &StackContext, state: &StackState) {
        let stack_name = ctx.stack_name();
        let key = |field: &str| keys::published_key(stack_name, field);

        self.properties.set(key("project"), ctx.project_name());
        self.properties
            .set(key("state-file"), ctx.state_file().display().to_string());

        for (service, info) in &state.services {
            self.properties
                .set(key(&format!("{service}.container-id")), info.container_id());
            for port in info.published_ports() {
                self.properties.set(
                    key(&format!("{service}.port.{}", port.container_port)),
                    port.host_port.to_string(),
                );
            }
        }
    }
}
