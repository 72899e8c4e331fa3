/// 编排命令相关常量
pub mod compose {
    /// docker 可执行文件名
    pub const DOCKER_PROGRAM: &str = "docker";

    /// 插件形式：`docker compose`
    pub const PLUGIN_DIALECT: &[&str] = &["docker", "compose"];

    /// 独立形式：`docker-compose`
    pub const STANDALONE_DIALECT: &[&str] = &["docker-compose"];

    /// 版本探测子命令
    pub const VERSION_SUBCOMMAND: &str = "version";

    /// compose 为容器、网络打上的项目标签
    pub const PROJECT_LABEL: &str = "com.docker.compose.project";

    /// 解析 ps 输出时缺少容器 ID 的占位值
    pub const UNKNOWN_CONTAINER_ID: &str = "unknown";

    /// 端口映射缺省协议
    pub const DEFAULT_PROTOCOL: &str = "tcp";

    /// 删除容器时 docker 返回的"不存在"提示
    pub const NO_SUCH_CONTAINER: &str = "no such container";
}

/// 超时与轮询相关常量
pub mod timeout {
    /// 单条编排命令的默认超时时间（秒）
    pub const COMMAND_TIMEOUT: u64 = 300;

    /// 方言探测命令超时时间（秒）
    pub const PROBE_TIMEOUT: u64 = 15;

    /// 等待服务就绪的默认超时时间（秒）
    pub const SERVICE_START_TIMEOUT: u64 = 120;

    /// 服务状态检查间隔（毫秒）
    pub const SERVICE_CHECK_INTERVAL_MS: u64 = 1000;
}

/// 日志采集相关常量
pub mod logs {
    /// 默认采集的日志尾部行数
    pub const DEFAULT_TAIL_LINES: u32 = 200;

    /// 就绪失败时附带诊断的日志行数
    pub const FAILURE_TAIL_LINES: u32 = 100;
}

/// 状态文件相关常量
pub mod state {
    /// 默认构建输出目录
    pub const DEFAULT_BUILD_DIR: &str = "target";

    /// 状态文件所在子目录名
    pub const STATE_DIR_NAME: &str = "stack-state";

    /// 状态文件扩展名
    pub const STATE_FILE_EXTENSION: &str = "json";
}

/// 驱动配置文件相关常量
pub mod config {
    /// 按优先级查找的配置文件名
    pub const CONFIG_FILE_NAMES: &[&str] = &["stack.toml", ".stack.toml"];

    /// 默认配置文件名
    pub const DEFAULT_CONFIG_FILE: &str = "stack.toml";

    /// 默认编排文件名
    pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";
}

/// 跨进程共享配置项（键名与对应的环境变量）
pub mod properties {
    pub const STACK_NAME: &str = "stack.name";
    pub const PROJECT: &str = "stack.project";
    pub const FILES: &str = "stack.files";
    pub const ENV_FILES: &str = "stack.env-files";
    pub const PROFILES: &str = "stack.profiles";
    pub const LIFECYCLE: &str = "stack.lifecycle";
    pub const WAIT_SERVICES: &str = "stack.wait-services";
    pub const STATE_DIR: &str = "stack.state-dir";
    pub const DELEGATE: &str = "stack.delegate";

    /// 配置项与环境变量的对应关系，进程启动时按此表从环境变量读取
    pub const ENV_BINDINGS: &[(&str, &str)] = &[
        (STACK_NAME, "STACK_NAME"),
        (PROJECT, "STACK_PROJECT"),
        (FILES, "STACK_FILES"),
        (ENV_FILES, "STACK_ENV_FILES"),
        (PROFILES, "STACK_PROFILES"),
        (LIFECYCLE, "STACK_LIFECYCLE"),
        (WAIT_SERVICES, "STACK_WAIT_SERVICES"),
        (STATE_DIR, "STACK_STATE_DIR"),
        (DELEGATE, "STACK_DELEGATE"),
    ];

    /// 运行期发布给测试代码的配置项前缀，完整形式为 `stack.<栈名>.<字段>`
    pub fn published_key(stack_name: &str, field: &str) -> String {
        format!("stack.{stack_name}.{field}")
    }
}
