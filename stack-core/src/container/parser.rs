use super::types::{PortMapping, ServiceInfo, ServiceStatus};
use crate::constants::compose;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 按状态文本分类服务状态（不区分大小写，按子串匹配，优先级从高到低）
pub fn classify_status(raw: &str) -> ServiceStatus {
    let text = raw.to_lowercase();
    if text.contains("healthy") {
        ServiceStatus::Healthy
    } else if text.contains("running") || text.contains("up") {
        ServiceStatus::Running
    } else if text.contains("exit") || text.contains("stop") {
        ServiceStatus::Stopped
    } else if text.contains("restart") {
        ServiceStatus::Restarting
    } else {
        ServiceStatus::Unknown
    }
}

/// 解析单个端口条目，格式为 `[宿主机IP:]宿主机端口->容器端口[/协议]`
///
/// 不含 `->` 的条目（仅暴露未发布的端口）或端口不是正整数时返回 None。
pub fn parse_port_entry(entry: &str) -> Option<PortMapping> {
    let (host, container) = entry.trim().split_once("->")?;

    // `0.0.0.0:8080`、`:::8080`、`[::]:8080` 都取最后一个冒号之后的部分
    let host_port = host.rsplit(':').next()?.trim();

    let (container_port, protocol) = match container.split_once('/') {
        Some((port, protocol)) => (port, protocol.trim()),
        None => (container, ""),
    };
    let protocol = if protocol.is_empty() {
        compose::DEFAULT_PROTOCOL.to_string()
    } else {
        protocol.to_lowercase()
    };

    let host_port = parse_positive_port(host_port)?;
    let container_port = parse_positive_port(container_port.trim())?;

    Some(PortMapping::new(host_port, container_port, protocol))
}

fn parse_positive_port(text: &str) -> Option<u16> {
    text.parse::<u16>().ok().filter(|port| *port > 0)
}

/// 解析逗号分隔的端口文本，丢弃无法解析的条目，合并重复映射（IPv4/IPv6 各一条）
pub fn parse_ports(raw: &str) -> Vec<PortMapping> {
    let mut ports: Vec<PortMapping> = Vec::new();
    for entry in raw.split(',').filter(|s| !s.trim().is_empty()) {
        match parse_port_entry(entry) {
            Some(mapping) => {
                if !ports.contains(&mapping) {
                    ports.push(mapping);
                }
            }
            None => debug!("忽略无法解析的端口条目: {}", entry.trim()),
        }
    }
    ports
}

/// 解析 `ps --format json` 的输出
///
/// 每行一个 JSON 对象；较早的 compose 版本会输出整段 JSON 数组，同样支持。
/// 无法解析的行被跳过，不影响其余行。
pub fn parse_service_listing(output: &str) -> BTreeMap<String, ServiceInfo> {
    let mut services = BTreeMap::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value = match serde_json::from_str::<Value>(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("解析服务 JSON 失败: {}, 内容: {}", e, line);
                continue;
            }
        };

        let entries = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        for entry in &entries {
            match service_from_json(entry) {
                Some((name, info)) => {
                    services.insert(name, info);
                }
                None => warn!("服务记录缺少服务名，已跳过: {}", entry),
            }
        }
    }

    services
}

/// 从单条 ps 记录中提取服务名和容器信息
pub fn service_from_json(entry: &Value) -> Option<(String, ServiceInfo)> {
    let object = entry.as_object()?;
    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let service_name = text("Service").or_else(|| text("Name"))?.to_string();
    let container_id = text("ID").unwrap_or(compose::UNKNOWN_CONTAINER_ID);
    let container_name = text("Name").unwrap_or(&service_name).to_string();

    let mut state = text("Status")
        .or_else(|| text("State"))
        .unwrap_or("unknown")
        .to_string();
    if let Some(health) = text("Health") {
        if !state.to_lowercase().contains(&health.to_lowercase()) {
            state = format!("{state} ({health})");
        }
    }

    let mut ports = text("Ports").map(parse_ports).unwrap_or_default();
    if ports.is_empty() {
        ports = parse_publishers(object.get("Publishers"));
    }

    Some((
        service_name,
        ServiceInfo::new(container_id, container_name, state, ports),
    ))
}

/// 解析 compose v2 的 `Publishers` 数组，未发布（PublishedPort 为 0）的条目被忽略
fn parse_publishers(value: Option<&Value>) -> Vec<PortMapping> {
    let mut ports: Vec<PortMapping> = Vec::new();
    let Some(items) = value.and_then(Value::as_array) else {
        return ports;
    };

    for item in items {
        let port = |key: &str| {
            item.get(key)
                .and_then(Value::as_u64)
                .and_then(|p| u16::try_from(p).ok())
                .filter(|p| *p > 0)
        };
        let (Some(host_port), Some(container_port)) = (port("PublishedPort"), port("TargetPort"))
        else {
            continue;
        };
        let protocol = item
            .get("Protocol")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .unwrap_or(compose::DEFAULT_PROTOCOL);

        let mapping = PortMapping::new(host_port, container_port, protocol.to_lowercase());
        if !ports.contains(&mapping) {
            ports.push(mapping);
        }
    }

    ports
}

/// 解析 `docker ps -q` / `docker network ls --format` 这类每行一个值的输出
pub fn parse_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
