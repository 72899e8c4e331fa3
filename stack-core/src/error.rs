use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StackError>;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("编排命令不可用: 已尝试 {attempted:?}，均无法执行")]
    CommandUnavailable { attempted: Vec<String> },

    #[error("编排命令存在但无法正常工作 ({command}): 退出码 {exit_code}, {stderr}")]
    ToolBroken {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("无法启动进程 {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("命令执行超时 ({timeout:?}): {command}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("命令执行失败 ({command}): 退出码 {exit_code}, {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("启动编排栈失败 (栈: {stack}, 项目: {project}): 退出码 {exit_code}, {stderr}")]
    StartFailed {
        stack: String,
        project: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("等待服务就绪超时 (项目: {project}, 超时: {timeout:?}): 未就绪服务 [{}]", .unready.join(", "))]
    ServicesNotReady {
        project: String,
        unready: Vec<String>,
        timeout: Duration,
    },

    #[error("状态文件错误 {}: {reason}", .path.display())]
    StateIo { path: PathBuf, reason: String },

    #[error("清理步骤 {step} 失败 (项目: {project}): {reason}")]
    Cleanup {
        step: String,
        project: String,
        reason: String,
    },

    #[error("编排文件不存在: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("缺少必需的配置项: {0}")]
    MissingProperty(String),

    #[error("配置无效: {0}")]
    InvalidConfig(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("YAML 解析错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("配置文件解析错误: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("配置文件序列化错误: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl StackError {
    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into().trim().to_string(),
        }
    }

    pub fn state_io(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::StateIo {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn cleanup(
        step: impl Into<String>,
        project: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Cleanup {
            step: step.into(),
            project: project.into(),
            reason: reason.into(),
        }
    }
}
