use crate::container::StackState;
use crate::state::StateLayout;
use std::path::{Path, PathBuf};

/// 扩展的生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    NotStarted,
    Running,
    TornDown,
}

/// 单个测试单元的栈上下文
///
/// 由 `setup` 创建，显式传给 `teardown`，不依赖任何线程局部存储。
#[derive(Debug, Clone)]
pub struct StackContext {
    test_unit: String,
    stack_name: String,
    project_name: String,
    phase: LifecyclePhase,
    owned: bool,
    layout: StateLayout,
    state_file: PathBuf,
    state: Option<StackState>,
}

impl StackContext {
    pub(crate) fn new(
        test_unit: impl Into<String>,
        stack_name: impl Into<String>,
        project_name: impl Into<String>,
        owned: bool,
        layout: StateLayout,
    ) -> Self {
        let stack_name = stack_name.into();
        let state_file = layout.state_file(&stack_name);
        Self {
            test_unit: test_unit.into(),
            stack_name,
            project_name: project_name.into(),
            phase: LifecyclePhase::NotStarted,
            owned,
            layout,
            state_file,
            state: None,
        }
    }

    pub fn test_unit(&self) -> &str {
        &self.test_unit
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// 是否由本进程启动（只有本进程启动的栈才会在清理时被删除）
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn state(&self) -> Option<&StackState> {
        self.state.as_ref()
    }

    /// 服务在宿主机上映射的端口
    pub fn host_port(&self, service: &str, container_port: u16) -> Option<u16> {
        self.state.as_ref()?.host_port(service, container_port)
    }

    pub(crate) fn mark_running(&mut self, state: StackState) {
        self.state = Some(state);
        self.phase = LifecyclePhase::Running;
    }

    pub(crate) fn mark_torn_down(&mut self) {
        self.phase = LifecyclePhase::TornDown;
    }
}
