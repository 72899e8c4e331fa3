use crate::constants::{config, properties as keys};
use crate::properties::StackProperties;
use crate::state::StateLayout;
use crate::{Result, StackError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// 栈的生命周期范围：整个测试套件、单个测试类或单个测试方法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleScope {
    #[default]
    Suite,
    Class,
    Method,
}

impl LifecycleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleScope::Suite => "suite",
            LifecycleScope::Class => "class",
            LifecycleScope::Method => "method",
        }
    }
}

impl fmt::Display for LifecycleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LifecycleScope {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suite" => Ok(LifecycleScope::Suite),
            "class" => Ok(LifecycleScope::Class),
            "method" => Ok(LifecycleScope::Method),
            other => Err(StackError::invalid_config(format!(
                "未知的生命周期范围: {other} (可选 suite/class/method)"
            ))),
        }
    }
}

/// 栈的来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackSource {
    /// 由本进程启动并负责清理
    Managed {
        compose_files: Vec<PathBuf>,
        env_files: Vec<PathBuf>,
        profiles: Vec<String>,
    },
    /// 由驱动进程启动，本进程只读取其状态文件
    Delegated,
}

/// 测试进程从共享配置项中读取到的栈引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackReference {
    pub stack_name: String,
    pub compose_files: Vec<PathBuf>,
    pub env_files: Vec<PathBuf>,
    pub profiles: Vec<String>,
    pub lifecycle: LifecycleScope,
    pub wait_services: Vec<String>,
    pub project_name: Option<String>,
    pub state_dir: Option<PathBuf>,
    pub delegate: bool,
}

impl StackReference {
    /// 读取栈引用；栈名缺失或为空白时报错
    pub fn from_properties(properties: &StackProperties) -> Result<Self> {
        let stack_name = properties.require(keys::STACK_NAME)?;
        let lifecycle = match properties.get_non_blank(keys::LIFECYCLE) {
            Some(value) => value.parse()?,
            None => LifecycleScope::default(),
        };

        Ok(Self {
            stack_name,
            compose_files: to_paths(properties.get_list(keys::FILES)),
            env_files: to_paths(properties.get_list(keys::ENV_FILES)),
            profiles: properties.get_list(keys::PROFILES),
            lifecycle,
            wait_services: properties.get_list(keys::WAIT_SERVICES),
            project_name: properties.get_non_blank(keys::PROJECT),
            state_dir: properties.get_non_blank(keys::STATE_DIR).map(PathBuf::from),
            delegate: properties.get_bool(keys::DELEGATE).unwrap_or(false),
        })
    }

    /// 决定栈的来源
    ///
    /// 同时给出编排文件和委托标记时以委托为准，编排文件被忽略。
    /// 两者都没有时使用当前目录下的默认编排文件。
    pub fn resolve_source(&self) -> StackSource {
        if self.delegate {
            if !self.compose_files.is_empty() {
                warn!(
                    "栈 {} 同时指定了编排文件和委托管理，以委托为准，忽略编排文件",
                    self.stack_name
                );
            }
            return StackSource::Delegated;
        }

        let compose_files = if self.compose_files.is_empty() {
            vec![PathBuf::from(config::DEFAULT_COMPOSE_FILE)]
        } else {
            self.compose_files.clone()
        };

        StackSource::Managed {
            compose_files,
            env_files: self.env_files.clone(),
            profiles: self.profiles.clone(),
        }
    }

    pub fn state_layout(&self) -> StateLayout {
        match &self.state_dir {
            Some(dir) => StateLayout::at(dir),
            None => StateLayout::default(),
        }
    }
}

fn to_paths(items: Vec<String>) -> Vec<PathBuf> {
    items.into_iter().map(PathBuf::from).collect()
}

/// 生成项目名：`<栈名>-<测试单元>-<yyyyMMddHHmmssSSS>`
///
/// 全部转为小写，只保留 `[a-z0-9_-]`，其余字符替换为 `-`。
pub fn derive_project_name(
    stack_name: &str,
    test_unit: &str,
    timestamp: DateTime<Utc>,
) -> Result<String> {
    let invalid = Regex::new(r"[^a-z0-9_-]+")
        .map_err(|e| StackError::invalid_config(format!("正则表达式编译失败: {e}")))?;

    let sanitize = |raw: &str| {
        let lowered = raw.to_lowercase();
        invalid
            .replace_all(&lowered, "-")
            .trim_matches('-')
            .to_string()
    };

    let stack = sanitize(stack_name);
    if stack.is_empty() {
        return Err(StackError::invalid_config(format!(
            "栈名无法用于项目名: {stack_name:?}"
        )));
    }

    let unit = match sanitize(test_unit) {
        unit if unit.is_empty() => "unit".to_string(),
        unit => unit,
    };

    Ok(format!(
        "{stack}-{unit}-{}",
        timestamp.format("%Y%m%d%H%M%S%3f")
    ))
}
