use crate::constants::{compose, logs, timeout};
use crate::{Result, StackError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 服务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    /// 运行中且健康检查通过
    Healthy,
    Stopped,
    Restarting,
    Unknown,
}

impl ServiceStatus {
    /// 获取状态的中文显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "运行中",
            ServiceStatus::Healthy => "健康",
            ServiceStatus::Stopped => "已停止",
            ServiceStatus::Restarting => "重启中",
            ServiceStatus::Unknown => "未知",
        }
    }

    /// 当前状态是否满足目标状态
    ///
    /// 目标为 Running 时 Healthy 也算满足；目标为 Healthy 时必须是 Healthy；
    /// 其余目标要求完全一致。
    pub fn satisfies(&self, target: ServiceStatus) -> bool {
        match target {
            ServiceStatus::Running => {
                matches!(self, ServiceStatus::Running | ServiceStatus::Healthy)
            }
            other => *self == other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Restarting => "restarting",
            ServiceStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(ServiceStatus::Running),
            "healthy" => Ok(ServiceStatus::Healthy),
            "stopped" => Ok(ServiceStatus::Stopped),
            "restarting" => Ok(ServiceStatus::Restarting),
            "unknown" => Ok(ServiceStatus::Unknown),
            other => Err(StackError::invalid_config(format!("未知的服务状态: {other}"))),
        }
    }
}

fn default_protocol() -> String {
    compose::DEFAULT_PROTOCOL.to_string()
}

/// 端口映射（宿主机端口 -> 容器端口）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl PortMapping {
    pub fn new(host_port: u16, container_port: u16, protocol: impl Into<String>) -> Self {
        Self {
            host_port,
            container_port,
            protocol: protocol.into(),
        }
    }

    pub fn tcp(host_port: u16, container_port: u16) -> Self {
        Self::new(host_port, container_port, compose::DEFAULT_PROTOCOL)
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}/{}",
            self.host_port, self.container_port, self.protocol
        )
    }
}

/// 单个服务的容器信息，由解析编排工具输出得到
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    container_id: String,
    container_name: String,
    /// 编排工具给出的原始状态文本
    state: String,
    #[serde(default)]
    published_ports: Vec<PortMapping>,
}

impl ServiceInfo {
    pub fn new(
        container_id: impl Into<String>,
        container_name: impl Into<String>,
        state: impl Into<String>,
        published_ports: Vec<PortMapping>,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            container_name: container_name.into(),
            state: state.into(),
            published_ports,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn published_ports(&self) -> &[PortMapping] {
        &self.published_ports
    }

    /// 按原始状态文本分类
    pub fn status(&self) -> ServiceStatus {
        super::parser::classify_status(&self.state)
    }

    /// 查找容器端口对应的宿主机端口
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.published_ports
            .iter()
            .find(|p| p.container_port == container_port)
            .map(|p| p.host_port)
    }
}

/// 持久化的编排栈状态，供另一个进程读取
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackState {
    pub config_name: String,
    pub project_name: String,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceInfo>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl StackState {
    pub fn new(config_name: impl Into<String>, project_name: impl Into<String>) -> Self {
        Self {
            config_name: config_name.into(),
            project_name: project_name.into(),
            services: BTreeMap::new(),
            networks: Vec::new(),
            started_at: None,
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceInfo> {
        self.services.get(name)
    }

    pub fn host_port(&self, service: &str, container_port: u16) -> Option<u16> {
        self.service(service)
            .and_then(|info| info.host_port(container_port))
    }
}

/// 等待服务就绪的配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    pub project_name: String,
    pub required_services: Vec<String>,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub target_status: ServiceStatus,
}

impl WaitConfig {
    pub fn new<I, S>(project_name: impl Into<String>, required_services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            project_name: project_name.into(),
            required_services: required_services.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(timeout::SERVICE_START_TIMEOUT),
            poll_interval: Duration::from_millis(timeout::SERVICE_CHECK_INTERVAL_MS),
            target_status: ServiceStatus::Running,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_target(mut self, target_status: ServiceStatus) -> Self {
        self.target_status = target_status;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.required_services.is_empty() {
            return Err(StackError::invalid_config(format!(
                "项目 {} 没有指定需要等待的服务",
                self.project_name
            )));
        }
        if self.poll_interval.is_zero() || self.poll_interval >= self.timeout {
            return Err(StackError::invalid_config(format!(
                "轮询间隔 {:?} 必须大于零且小于超时时间 {:?}",
                self.poll_interval, self.timeout
            )));
        }
        Ok(())
    }
}

/// 启动编排栈的配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartConfig {
    /// 栈名（配置名）
    pub config_name: String,
    pub project_name: String,
    /// 编排文件，按顺序传给 `-f`
    pub compose_files: Vec<PathBuf>,
    pub env_files: Vec<PathBuf>,
    pub profiles: Vec<String>,
    /// 传给编排进程的环境变量
    pub environment: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl StartConfig {
    pub fn new(config_name: impl Into<String>, project_name: impl Into<String>) -> Self {
        Self {
            config_name: config_name.into(),
            project_name: project_name.into(),
            ..Default::default()
        }
    }

    pub fn compose_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.compose_files.push(path.into());
        self
    }

    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_files.push(path.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// 日志采集配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsConfig {
    /// 为空时采集全部服务
    pub services: Vec<String>,
    pub tail_lines: u32,
    pub follow: bool,
    pub timestamps: bool,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            tail_lines: logs::DEFAULT_TAIL_LINES,
            follow: false,
            timestamps: false,
        }
    }
}

impl LogsConfig {
    pub fn tail(lines: u32) -> Self {
        Self {
            tail_lines: lines,
            ..Default::default()
        }
    }

    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// 实际使用的尾部行数，最少 1 行
    pub fn effective_tail(&self) -> u32 {
        self.tail_lines.max(1)
    }
}
