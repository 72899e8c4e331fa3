use super::command::build_version_args;
use crate::constants::{compose, timeout};
use crate::runner::{CommandRequest, CommandRunner};
use crate::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// 编排工具的两种命令形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeDialect {
    /// `docker compose`（新语法）
    Plugin,
    /// `docker-compose`（旧语法）
    Standalone,
}

impl ComposeDialect {
    /// 探测顺序
    pub const PROBE_ORDER: [ComposeDialect; 2] = [ComposeDialect::Plugin, ComposeDialect::Standalone];

    pub fn tokens(&self) -> &'static [&'static str] {
        match self {
            ComposeDialect::Plugin => compose::PLUGIN_DIALECT,
            ComposeDialect::Standalone => compose::STANDALONE_DIALECT,
        }
    }

    /// 需要调用的可执行文件
    pub fn program(&self) -> &'static str {
        self.tokens()[0]
    }

    pub fn prefix(&self) -> Vec<String> {
        self.tokens().iter().map(|s| s.to_string()).collect()
    }

    pub fn display_name(&self) -> String {
        self.tokens().join(" ")
    }
}

/// 编排命令方言探测器
///
/// 探测结果按实例缓存：同一实例多次调用 [`detect`](Self::detect) 只会执行一次探测命令。
pub struct DialectDetector {
    runner: Arc<dyn CommandRunner>,
    probe_timeout: Duration,
    detected: OnceCell<ComposeDialect>,
}

impl DialectDetector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            probe_timeout: Duration::from_secs(timeout::PROBE_TIMEOUT),
            detected: OnceCell::new(),
        }
    }

    /// 使用预先指定的方言，不再执行探测
    pub fn with_dialect(runner: Arc<dyn CommandRunner>, dialect: ComposeDialect) -> Self {
        let detector = Self::new(runner);
        // 新建的 OnceCell 必然为空
        let _ = detector.detected.set(dialect);
        detector
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// 返回所有编排命令需要添加的前缀
    pub async fn detect(&self) -> Result<Vec<String>> {
        Ok(self.dialect().await?.prefix())
    }

    /// 返回探测到的方言
    pub async fn dialect(&self) -> Result<ComposeDialect> {
        self.detected
            .get_or_try_init(|| self.probe())
            .await
            .copied()
    }

    /// 已缓存的方言（未探测时为 None）
    pub fn cached(&self) -> Option<ComposeDialect> {
        self.detected.get().copied()
    }

    async fn probe(&self) -> Result<ComposeDialect> {
        for dialect in ComposeDialect::PROBE_ORDER {
            let request = CommandRequest::new(build_version_args(&dialect.prefix()))
                .with_timeout(self.probe_timeout);

            match self.runner.execute(&request).await {
                Ok(output) if output.is_success() => {
                    info!("使用编排命令: {}", dialect.display_name());
                    return Ok(dialect);
                }
                Ok(output) => debug!(
                    "{} 不可用 (退出码 {}): {}",
                    dialect.display_name(),
                    output.exit_code(),
                    output.stderr().trim()
                ),
                Err(e) => debug!("{} 无法执行: {}", dialect.display_name(), e),
            }
        }

        warn!("未找到可用的编排命令");
        Err(StackError::CommandUnavailable {
            attempted: ComposeDialect::PROBE_ORDER
                .iter()
                .map(ComposeDialect::display_name)
                .collect(),
        })
    }

    /// 使用已探测的方言再次执行 version 命令
    ///
    /// 用于区分"工具缺失"（无法启动进程，返回 CommandUnavailable）和
    /// "工具存在但无法工作"（非零退出码，返回 ToolBroken）。
    pub async fn validate(&self) -> Result<ComposeDialect> {
        let dialect = self.dialect().await?;
        let request = CommandRequest::new(build_version_args(&dialect.prefix()))
            .with_timeout(self.probe_timeout);

        let output = match self.runner.execute(&request).await {
            Ok(output) => output,
            Err(StackError::Launch { command, .. }) => {
                return Err(StackError::CommandUnavailable {
                    attempted: vec![command],
                });
            }
            Err(e) => return Err(e),
        };

        if !output.is_success() {
            return Err(StackError::ToolBroken {
                command: request.display(),
                exit_code: output.exit_code(),
                stderr: output.stderr().trim().to_string(),
            });
        }

        debug!("{} 版本: {}", dialect.display_name(), output.stdout().trim());
        Ok(dialect)
    }
}
