//! 跨进程的栈发现与分层清理
//!
//! 驱动进程通过环境变量传递栈名、编排文件等信息；测试进程在 `setup` 中
//! 接管驱动进程留下的状态文件，或自行启动、等待并持久化，最后在 `teardown`
//! 中按步骤尽力清理。

mod context;
mod lifecycle;
mod reference;
mod teardown;

pub use context::{LifecyclePhase, StackContext};
pub use lifecycle::{ExtensionSettings, StackExtension};
pub use reference::{LifecycleScope, StackReference, StackSource, derive_project_name};
pub use teardown::{CleanupStep, StepOutcome, TeardownReport, run_layered_teardown};
