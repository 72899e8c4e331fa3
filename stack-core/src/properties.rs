use crate::constants::properties::ENV_BINDINGS;
use crate::{Result, StackError};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

static GLOBAL_PROPERTIES: Lazy<Arc<StackProperties>> =
    Lazy::new(|| Arc::new(StackProperties::from_env()));

/// 进程级共享配置项
///
/// 驱动进程通过环境变量把栈名、项目名、编排文件等信息传给测试进程；
/// 测试进程启动后从环境变量初始化，运行期再把端口等信息发布回来供测试代码读取。
#[derive(Debug, Default)]
pub struct StackProperties {
    values: DashMap<String, String>,
}

/// 进程级配置项实例（首次访问时从环境变量初始化）
pub fn global() -> Arc<StackProperties> {
    GLOBAL_PROPERTIES.clone()
}

impl StackProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按 [`ENV_BINDINGS`] 从环境变量读取配置项
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 按 [`ENV_BINDINGS`] 从任意来源读取配置项，空白值忽略
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let properties = Self::new();
        for (key, env_name) in ENV_BINDINGS {
            if let Some(value) = lookup(env_name).filter(|v| !v.trim().is_empty()) {
                debug!("从环境变量 {} 读取配置项 {}", env_name, key);
                properties.set(*key, value);
            }
        }
        properties
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    /// 读取去除首尾空白后非空的值
    pub fn get_non_blank(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// 读取必需的配置项，缺失或为空白时报错
    pub fn require(&self, key: &str) -> Result<String> {
        self.get_non_blank(key)
            .ok_or_else(|| StackError::MissingProperty(key.to_string()))
    }

    /// 读取逗号分隔的列表，忽略空项
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| split_list(&value))
            .unwrap_or_default()
    }

    /// 读取布尔值：true/1/yes/on 为真，其余为假，缺失为 None
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_non_blank(key).map(|v| {
            matches!(
                v.to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )
        })
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.remove(key).map(|(_, value)| value)
    }

    /// 删除以指定前缀开头的所有配置项，返回删除数量
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .values
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &keys {
            self.values.remove(key);
        }
        keys.len()
    }

    /// 当前所有配置项的有序快照
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// 按逗号拆分并去除空白项
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::properties;

    #[test]
    fn test_from_lookup_reads_bound_variables() {
        let props = StackProperties::from_lookup(|name| match name {
            "STACK_NAME" => Some("orders".to_string()),
            "STACK_FILES" => Some("a.yml, b.yml".to_string()),
            "STACK_PROJECT" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(props.get(properties::STACK_NAME).as_deref(), Some("orders"));
        assert_eq!(props.get_list(properties::FILES), vec!["a.yml", "b.yml"]);
        assert_eq!(props.get(properties::PROJECT), None);
        assert_eq!(props.snapshot().len(), 2);
    }

    #[test]
    fn test_require_rejects_blank() {
        let props = StackProperties::new();
        props.set(properties::STACK_NAME, "  ");
        match props.require(properties::STACK_NAME) {
            Err(StackError::MissingProperty(key)) => assert_eq!(key, "stack.name"),
            other => panic!("unexpected result: {other:?}"),
        }

        props.set(properties::STACK_NAME, " orders ");
        assert_eq!(props.require(properties::STACK_NAME).unwrap(), "orders");
    }

    #[test]
    fn test_get_bool() {
        let props = StackProperties::new();
        assert_eq!(props.get_bool(properties::DELEGATE), None);
        props.set(properties::DELEGATE, "TRUE");
        assert_eq!(props.get_bool(properties::DELEGATE), Some(true));
        props.set(properties::DELEGATE, "no");
        assert_eq!(props.get_bool(properties::DELEGATE), Some(false));
    }

    #[test]
    fn test_remove_prefix_only_touches_matching_keys() {
        let props = StackProperties::new();
        props.set("stack.orders.project", "p");
        props.set("stack.orders.web.8080", "32768");
        props.set("stack.other.project", "q");
        props.set(properties::STACK_NAME, "orders");

        assert_eq!(props.remove_prefix("stack.orders."), 2);
        assert_eq!(
            props.snapshot().keys().cloned().collect::<Vec<_>>(),
            vec!["stack.name", "stack.other.project"]
        );
        assert_eq!(props.remove("stack.other.project").as_deref(), Some("q"));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" web ,, db,"), vec!["web", "db"]);
        assert!(split_list("").is_empty());
    }
}
