use anyhow::{Context, Result};
use stack_core::config::HarnessConfig;
use stack_core::container::StackOrchestrator;
use stack_core::extension::derive_project_name;
use stack_core::state::{StateLayout, read_state};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cli::Commands;
use crate::commands;

/// 驱动进程中用于派生项目名的测试单元名
const DRIVER_UNIT: &str = "driver";

pub struct CliApp {
    pub config: HarnessConfig,
    pub orchestrator: StackOrchestrator,
}

impl CliApp {
    /// 加载配置并创建编排栈管理器
    ///
    /// 指定路径时必须存在；未指定时依次查找 stack.toml、.stack.toml，都没有则使用默认配置。
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "配置文件 '{}' 未找到，请先运行 'stack-cli init'",
                        path.display()
                    );
                }
                HarnessConfig::load_from_file(path)
                    .with_context(|| format!("加载配置文件失败: {}", path.display()))?
            }
            None => HarnessConfig::find_and_load_config().context("加载配置文件失败")?,
        };
        Ok(Self::new(config))
    }

    pub fn new(config: HarnessConfig) -> Self {
        let mut orchestrator = StackOrchestrator::system()
            .with_command_timeout(config.command_timeout())
            .with_remove_volumes(config.compose.remove_volumes);
        if let Some(dialect) = config.compose.dialect.fixed() {
            orchestrator = orchestrator.with_dialect(dialect);
        }
        Self::with_orchestrator(config, orchestrator)
    }

    pub fn with_orchestrator(config: HarnessConfig, orchestrator: StackOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.config.stack.name
    }

    pub fn layout(&self) -> StateLayout {
        self.config.state_layout()
    }

    pub fn state_file(&self) -> PathBuf {
        self.layout().state_file(self.stack_name())
    }

    /// 生成新的项目名
    pub fn fresh_project_name(&self) -> Result<String> {
        let name = derive_project_name(
            self.stack_name(),
            DRIVER_UNIT,
            self.orchestrator.clock().wall_time(),
        )?;
        Ok(name)
    }

    /// 确定要操作的项目：命令行参数 -> 状态文件 -> 新生成的项目名
    pub fn resolve_project(&self, explicit: Option<String>) -> Result<String> {
        if let Some(project) = explicit {
            return Ok(project);
        }

        let state_file = self.state_file();
        match read_state(&state_file) {
            Ok(state) => {
                debug!("从状态文件读取项目名: {}", state.project_name);
                Ok(state.project_name)
            }
            Err(e) => {
                debug!("无法从状态文件读取项目名: {}", e);
                let project = self.fresh_project_name()?;
                info!("未找到运行中的项目，使用新项目名: {}", project);
                Ok(project)
            }
        }
    }

    /// 运行应用命令
    pub async fn run_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Init { .. } => unreachable!(), // 已经在 main.rs 中处理
            Commands::Doctor => commands::run_doctor(self).await,
            Commands::Up {
                project,
                print_env,
                no_wait,
            } => commands::run_up(self, project, print_env, no_wait).await,
            Commands::Wait {
                project,
                services,
                timeout_secs,
                target,
            } => commands::run_wait(self, project, services, timeout_secs, target).await,
            Commands::Ps { project } => commands::run_ps(self, project).await,
            Commands::Logs {
                project,
                services,
                tail,
                follow,
            } => commands::run_logs(self, project, services, tail, follow).await,
            Commands::Down { project } => commands::run_down(self, project).await,
            Commands::State => commands::show_state(self),
        }
    }
}
