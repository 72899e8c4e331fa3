// 模块声明
pub mod command;
pub mod dialect;
pub mod manifest;
mod orchestrator;
pub mod parser;
pub mod readiness;
mod types;

// 重新导出公共API
pub use dialect::{ComposeDialect, DialectDetector};
pub use orchestrator::StackOrchestrator;
pub use readiness::{ReadinessPoller, ServiceLister};
pub use types::{
    LogsConfig, PortMapping, ServiceInfo, ServiceStatus, StackState, StartConfig, WaitConfig,
};
