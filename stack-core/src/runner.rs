use crate::{Result, StackError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// 一次外部命令调用的描述
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// 追加到子进程环境中的变量
    pub env: BTreeMap<String, String>,
    /// 超时后返回已读取的输出而不是报错，用于 `logs --follow` 这类不会自行退出的命令
    pub keep_output_on_timeout: bool,
}

impl CommandRequest {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_working_dir(mut self, dir: Option<&Path>) -> Self {
        self.working_dir = dir.map(Path::to_path_buf);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_output_on_timeout(mut self) -> Self {
        self.keep_output_on_timeout = true;
        self
    }

    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// 用于日志和错误信息的命令行文本
    pub fn display(&self) -> String {
        self.args.join(" ")
    }
}

/// 外部命令的执行结果，构造后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// 超时被终止的进程在终止前写出的内容，没有退出码
    pub fn interrupted(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::new(-1, stdout, stderr)
        }
    }

    /// 从可能缺失的输出流构造，缺失的流按空字符串处理
    pub fn from_streams(exit_code: i32, stdout: Option<String>, stderr: Option<String>) -> Self {
        Self::new(
            exit_code,
            stdout.unwrap_or_default(),
            stderr.unwrap_or_default(),
        )
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// stdout 在前、stderr 在后的合并输出
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => {
                let mut text = self.stdout.clone();
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&self.stderr);
                text
            }
        }
    }
}

/// 外部命令执行器
///
/// 非零退出码是正常结果而不是错误；只有进程无法启动或超时才返回错误。
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput>;
}

/// 基于 tokio 子进程的命令执行器
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let command_line = request.display();
        let (program, args) = request.args.split_first().ok_or_else(|| StackError::Launch {
            command: command_line.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "命令为空"),
        })?;

        debug!("执行命令: {}", command_line);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 调用方的 future 被丢弃时由 tokio 强制结束子进程
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| StackError::Launch {
            command: command_line.clone(),
            source: e,
        })?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // 两个输出流同时读取，避免子进程写满管道后阻塞
        let collect = async {
            let (out, err) = tokio::join!(
                drain(stdout_pipe.as_mut(), &mut stdout),
                drain(stderr_pipe.as_mut(), &mut stderr)
            );
            if let Err(e) = out.and(err) {
                return Err(e);
            }
            child.wait().await
        };

        let finished = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, collect).await.map_err(|_| limit),
            None => Ok(collect.await),
        };

        let waited = match finished {
            Ok(result) => result,
            Err(limit) => {
                if let Err(e) = child.start_kill() {
                    debug!("终止超时进程失败: {} ({})", command_line, e);
                }
                if request.keep_output_on_timeout {
                    debug!("命令到达时限，保留已读取的输出: {} ({:?})", command_line, limit);
                    return Ok(CommandOutput::interrupted(
                        String::from_utf8_lossy(&stdout),
                        String::from_utf8_lossy(&stderr),
                    ));
                }
                warn!("命令超时，已终止进程: {} ({:?})", command_line, limit);
                return Err(StackError::CommandTimeout {
                    command: command_line,
                    timeout: limit,
                });
            }
        };

        let status = waited.map_err(|e| StackError::Launch {
            command: command_line.clone(),
            source: e,
        })?;

        // 被信号终止时没有退出码
        let exit_code = status.code().unwrap_or(-1);
        debug!("命令结束: {} (退出码 {})", command_line, exit_code);

        Ok(CommandOutput::new(
            exit_code,
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr),
        ))
    }
}

/// 分块读取输出流直到结束；每块读完立即追加，中途取消也不丢已读内容
async fn drain<R>(stream: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return Ok(());
    };
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
