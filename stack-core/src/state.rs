use crate::constants::state;
use crate::container::StackState;
use crate::{Result, StackError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 将编排栈状态写入 JSON 文件
///
/// 自动创建父目录，覆盖已存在的文件。先写入同目录下的临时文件再重命名，
/// 读取方不会看到写了一半的内容。
pub fn write_state(stack_state: &StackState, path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .map_err(|e| StackError::state_io(path, format!("创建目录失败: {e}")))?;

    let content = serde_json::to_string_pretty(stack_state)
        .map_err(|e| StackError::state_io(path, format!("序列化失败: {e}")))?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent)
        .map_err(|e| StackError::state_io(path, format!("创建临时文件失败: {e}")))?;
    temp.write_all(content.as_bytes())
        .map_err(|e| StackError::state_io(path, format!("写入失败: {e}")))?;
    temp.persist(path)
        .map_err(|e| StackError::state_io(path, format!("写入失败: {}", e.error)))?;

    debug!("已写入状态文件: {}", path.display());
    Ok(())
}

/// 从 JSON 文件读取编排栈状态
///
/// 文件不存在、无法读取、格式不符或端口为 0 时返回 [`StackError::StateIo`]。
pub fn read_state(path: &Path) -> Result<StackState> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StackError::state_io(path, "状态文件不存在")
        } else {
            StackError::state_io(path, format!("读取失败: {e}"))
        }
    })?;

    let stack_state: StackState = serde_json::from_str(&content)
        .map_err(|e| StackError::state_io(path, format!("解析失败: {e}")))?;

    for (name, service) in &stack_state.services {
        if let Some(port) = service
            .published_ports()
            .iter()
            .find(|p| p.host_port == 0 || p.container_port == 0)
        {
            return Err(StackError::state_io(
                path,
                format!("服务 {name} 的端口映射无效: {port}"),
            ));
        }
    }

    Ok(stack_state)
}

/// 状态文件的目录布局：`<构建目录>/stack-state/<栈名>.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    state_dir: PathBuf,
}

impl Default for StateLayout {
    fn default() -> Self {
        Self::new(state::DEFAULT_BUILD_DIR)
    }
}

impl StateLayout {
    /// 以构建目录为根：状态文件位于 `<build_dir>/stack-state`
    pub fn new(build_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: build_dir.as_ref().join(state::STATE_DIR_NAME),
        }
    }

    /// 直接指定状态文件目录
    pub fn at(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone()
    }

    /// 栈名对应的状态文件路径
    pub fn state_file(&self, stack_name: &str) -> PathBuf {
        self.state_dir()
            .join(format!("{stack_name}.{}", state::STATE_FILE_EXTENSION))
    }

    /// 某个项目专属的状态文件路径
    pub fn project_state_file(&self, stack_name: &str, project_name: &str) -> PathBuf {
        self.state_dir().join(format!(
            "{stack_name}-{project_name}.{}",
            state::STATE_FILE_EXTENSION
        ))
    }

    /// 删除栈的状态文件和该项目专属的状态文件，返回已删除的路径
    ///
    /// 只删除 `<栈名>.json` 与 `<栈名>-<项目名>.json`，栈名互为前缀的其他栈不受影响。
    /// 文件或目录不存在时视为无文件可删。
    pub fn remove_matching(&self, stack_name: &str, project_name: &str) -> Result<Vec<PathBuf>> {
        let mut candidates = vec![self.state_file(stack_name)];
        if !project_name.is_empty() {
            candidates.push(self.project_state_file(stack_name, project_name));
        }

        let mut removed = Vec::new();
        for path in candidates {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("已删除状态文件: {}", path.display());
                    removed.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("状态文件不存在: {}", path.display());
                }
                Err(e) => {
                    return Err(StackError::state_io(&path, format!("删除失败: {e}")));
                }
            }
        }

        Ok(removed)
    }
}
