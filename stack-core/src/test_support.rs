//! 测试用的脚本化命令执行器

use crate::runner::{CommandOutput, CommandRequest, CommandRunner};
use crate::{Result, StackError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Output(CommandOutput),
    LaunchFailure,
    Timeout,
}

struct Rule {
    needle: String,
    responses: VecDeque<Scripted>,
}

/// 按命令行子串匹配返回预设结果，并记录所有调用
///
/// 同一子串注册多个结果时按顺序依次返回，最后一个结果会一直重复。
/// 没有匹配规则的命令返回退出码 0 和空输出。
pub(crate) struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandRequest>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn on(&self, needle: &str, response: Scripted) -> &Self {
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|rule| rule.needle == needle) {
            Some(rule) => rule.responses.push_back(response),
            None => rules.push(Rule {
                needle: needle.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    pub(crate) fn ok(&self, needle: &str, stdout: &str) -> &Self {
        self.on(needle, Scripted::Output(CommandOutput::new(0, stdout, "")))
    }

    pub(crate) fn fail(&self, needle: &str, exit_code: i32, stderr: &str) -> &Self {
        self.on(
            needle,
            Scripted::Output(CommandOutput::new(exit_code, "", stderr)),
        )
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(CommandRequest::display)
            .collect()
    }

    pub(crate) fn requests(&self) -> Vec<CommandRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    /// 第一条包含子串的调用在全部调用中的位置
    pub(crate) fn position(&self, needle: &str) -> Option<usize> {
        self.calls().iter().position(|line| line.contains(needle))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let line = request.display();
        self.calls.lock().unwrap().push(request.clone());

        let response = {
            let mut rules = self.rules.lock().unwrap();
            rules
                .iter_mut()
                .find(|rule| line.contains(&rule.needle))
                .and_then(|rule| {
                    if rule.responses.len() > 1 {
                        rule.responses.pop_front()
                    } else {
                        rule.responses.front().cloned()
                    }
                })
        };

        match response {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::LaunchFailure) => Err(StackError::Launch {
                command: line,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
            Some(Scripted::Timeout) => Err(StackError::CommandTimeout {
                command: line,
                timeout: request.timeout.unwrap_or(Duration::from_secs(1)),
            }),
            None => Ok(CommandOutput::new(0, "", "")),
        }
    }
}
