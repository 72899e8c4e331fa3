use crate::constants::{config, logs, state, timeout};
use crate::container::{
    ComposeDialect, LogsConfig, ServiceStatus, StartConfig, WaitConfig, manifest,
};
use crate::error::{Result, StackError};
use crate::state::StateLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 驱动配置（stack.toml）
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    pub stack: StackSection,
    pub wait: WaitSection,
    pub logs: LogsSection,
    pub state: StateSection,
    pub compose: ComposeSection,
}

/// 编排栈配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StackSection {
    pub name: String,
    pub compose_files: Vec<PathBuf>,
    pub env_files: Vec<PathBuf>,
    pub profiles: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub environment: BTreeMap<String, String>,
}

impl Default for StackSection {
    fn default() -> Self {
        Self {
            name: "stack".to_string(),
            compose_files: vec![PathBuf::from(config::DEFAULT_COMPOSE_FILE)],
            env_files: Vec::new(),
            profiles: Vec::new(),
            working_dir: None,
            environment: BTreeMap::new(),
        }
    }
}

/// 就绪等待配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WaitSection {
    /// 为空时等待编排文件中声明的全部服务
    pub services: Vec<String>,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub target: ServiceStatus,
}

impl Default for WaitSection {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            timeout_secs: timeout::SERVICE_START_TIMEOUT,
            poll_interval_ms: timeout::SERVICE_CHECK_INTERVAL_MS,
            target: ServiceStatus::Running,
        }
    }
}

/// 日志采集配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LogsSection {
    pub tail: u32,
    pub timestamps: bool,
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            tail: logs::DEFAULT_TAIL_LINES,
            timestamps: false,
        }
    }
}

/// 状态文件配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StateSection {
    pub build_dir: PathBuf,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from(state::DEFAULT_BUILD_DIR),
        }
    }
}

/// 编排命令的方言选择
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DialectChoice {
    #[default]
    Auto,
    Plugin,
    Standalone,
}

impl DialectChoice {
    /// 固定的方言；`auto` 返回 None，由探测决定
    pub fn fixed(&self) -> Option<ComposeDialect> {
        match self {
            DialectChoice::Auto => None,
            DialectChoice::Plugin => Some(ComposeDialect::Plugin),
            DialectChoice::Standalone => Some(ComposeDialect::Standalone),
        }
    }
}

/// 编排命令配置
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ComposeSection {
    pub dialect: DialectChoice,
    pub command_timeout_secs: u64,
    pub remove_volumes: bool,
}

impl Default for ComposeSection {
    fn default() -> Self {
        Self {
            dialect: DialectChoice::Auto,
            command_timeout_secs: timeout::COMMAND_TIMEOUT,
            remove_volumes: true,
        }
    }
}

impl HarnessConfig {
    /// 按优先级查找配置文件：stack.toml -> .stack.toml
    pub fn find_config_file() -> Option<PathBuf> {
        config::CONFIG_FILE_NAMES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// 查找并加载配置文件，未找到时使用默认配置
    pub fn find_and_load_config() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("找到配置文件: {}", path.display());
                Self::load_from_file(path)
            }
            None => {
                tracing::warn!("未找到配置文件，使用默认配置");
                Ok(Self::default())
            }
        }
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: HarnessConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// 写入带注释的默认配置
    pub fn write_template<P: AsRef<Path>>(path: P, stack_name: &str) -> Result<()> {
        const TEMPLATE: &str = include_str!("../templates/stack.toml.template");

        let content = TEMPLATE
            .replace("{stack_name}", stack_name)
            .replace("{compose_file}", config::DEFAULT_COMPOSE_FILE)
            .replace("{timeout_secs}", &timeout::SERVICE_START_TIMEOUT.to_string())
            .replace(
                "{poll_interval_ms}",
                &timeout::SERVICE_CHECK_INTERVAL_MS.to_string(),
            )
            .replace("{tail}", &logs::DEFAULT_TAIL_LINES.to_string())
            .replace("{build_dir}", state::DEFAULT_BUILD_DIR)
            .replace("{command_timeout_secs}", &timeout::COMMAND_TIMEOUT.to_string());
        fs::write(&path, content)?;
        Ok(())
    }

    /// 检查配置的取值范围
    pub fn validate(&self) -> Result<()> {
        if self.stack.name.trim().is_empty() {
            return Err(StackError::invalid_config("stack.name 不能为空"));
        }
        if self.stack.compose_files.is_empty() {
            return Err(StackError::invalid_config("stack.compose_files 不能为空"));
        }
        if self.wait.poll_interval_ms == 0 || self.wait.timeout_secs == 0 {
            return Err(StackError::invalid_config(
                "wait.timeout_secs 与 wait.poll_interval_ms 必须大于 0",
            ));
        }
        if self.wait.poll_interval() >= self.wait.timeout() {
            return Err(StackError::invalid_config(
                "wait.poll_interval_ms 必须小于 wait.timeout_secs",
            ));
        }
        if self.compose.command_timeout_secs == 0 {
            return Err(StackError::invalid_config(
                "compose.command_timeout_secs 必须大于 0",
            ));
        }
        Ok(())
    }

    /// 编排文件路径，相对路径基于 working_dir
    pub fn resolved_compose_files(&self) -> Vec<PathBuf> {
        self.stack
            .compose_files
            .iter()
            .map(|file| self.resolve(file))
            .collect()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.stack.working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn to_start_config(&self, project_name: &str) -> StartConfig {
        let mut start = StartConfig::new(&self.stack.name, project_name);
        for file in self.resolved_compose_files() {
            start = start.compose_file(file);
        }
        for env_file in &self.stack.env_files {
            start = start.env_file(self.resolve(env_file));
        }
        for profile in &self.stack.profiles {
            start = start.profile(profile);
        }
        for (key, value) in &self.stack.environment {
            start = start.env(key, value);
        }
        if let Some(dir) = &self.stack.working_dir {
            start = start.working_dir(dir);
        }
        start
    }

    /// 生成等待配置
    ///
    /// 服务优先取 `services` 参数，其次取 `[wait] services`，都为空时读取编排文件中在启用的 profile 下会启动的服务。
    pub fn to_wait_config(&self, project_name: &str, services: &[String]) -> Result<WaitConfig> {
        let required = if !services.is_empty() {
            services.to_vec()
        } else if !self.wait.services.is_empty() {
            self.wait.services.clone()
        } else {
            manifest::service_names(&self.resolved_compose_files(), &self.stack.profiles)?
        };

        if required.is_empty() {
            return Err(StackError::invalid_config(
                "没有需要等待的服务，请在 [wait] services 中指定",
            ));
        }

        let wait = WaitConfig::new(project_name, required)
            .with_timeout(self.wait.timeout())
            .with_poll_interval(self.wait.poll_interval())
            .with_target(self.wait.target);
        wait.validate()?;
        Ok(wait)
    }

    pub fn logs_config(&self, services: &[String]) -> LogsConfig {
        let mut logs = LogsConfig::tail(self.logs.tail).with_services(services.iter().cloned());
        logs.timestamps = self.logs.timestamps;
        logs
    }

    pub fn state_layout(&self) -> StateLayout {
        StateLayout::new(self.resolve(&self.state.build_dir))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.compose.command_timeout_secs)
    }
}

impl WaitSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
