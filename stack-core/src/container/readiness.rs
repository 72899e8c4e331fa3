use super::types::{ServiceInfo, ServiceStatus, WaitConfig};
use crate::clock::Clock;
use crate::{Result, StackError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 能够列出项目服务状态的组件
#[async_trait]
pub trait ServiceLister: Send + Sync {
    async fn list_services(&self, project_name: &str) -> Result<BTreeMap<String, ServiceInfo>>;
}

/// 服务就绪轮询器
///
/// 每轮列出服务状态，全部满足目标状态即返回；超过超时时间则返回
/// [`StackError::ServicesNotReady`]。时间和休眠都通过注入的 [`Clock`] 完成。
pub struct ReadinessPoller {
    clock: Arc<dyn Clock>,
}

impl ReadinessPoller {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub async fn wait_for(
        &self,
        lister: &dyn ServiceLister,
        config: &WaitConfig,
    ) -> Result<ServiceStatus> {
        config.validate()?;

        let started = self.clock.now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!("检查服务状态 (项目 {}), 第 {} 次", config.project_name, attempt);

            let unready = match lister.list_services(&config.project_name).await {
                Ok(services) => unready_services(&services, config),
                Err(e) => {
                    // 单次查询失败视为尚未就绪，仍计入总超时
                    warn!("获取服务状态失败，稍后重试: {}", e);
                    config.required_services.clone()
                }
            };

            if unready.is_empty() {
                info!(
                    "项目 {} 的服务已就绪 ({}), 共检查 {} 次",
                    config.project_name, config.target_status, attempt
                );
                return Ok(config.target_status);
            }

            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= config.timeout {
                warn!(
                    "等待服务就绪超时 (项目 {}): {}",
                    config.project_name,
                    unready.join(", ")
                );
                return Err(StackError::ServicesNotReady {
                    project: config.project_name.clone(),
                    unready,
                    timeout: config.timeout,
                });
            }

            debug!("等待服务就绪: {}", unready.join(", "));
            self.clock.sleep(config.poll_interval).await;
        }
    }
}

/// 返回尚未达到目标状态的必需服务（保持配置中的顺序）
pub fn unready_services(
    services: &BTreeMap<String, ServiceInfo>,
    config: &WaitConfig,
) -> Vec<String> {
    config
        .required_services
        .iter()
        .filter(|name| {
            services
                .get(name.as_str())
                .map(|info| !info.status().satisfies(config.target_status))
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 按顺序返回预设状态，最后一个状态一直重复
    struct SequenceLister {
        steps: Mutex<Vec<Result<BTreeMap<String, ServiceInfo>>>>,
        calls: Mutex<u32>,
    }

    impl SequenceLister {
        fn new(steps: Vec<Result<BTreeMap<String, ServiceInfo>>>) -> Self {
            Self {
                steps: Mutex::new(steps),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ServiceLister for SequenceLister {
        async fn list_services(&self, _project: &str) -> Result<BTreeMap<String, ServiceInfo>> {
            *self.calls.lock().unwrap() += 1;
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.remove(0)
            } else {
                match &steps[0] {
                    Ok(map) => Ok(map.clone()),
                    Err(_) => Err(StackError::command_failed("ps", 1, "boom")),
                }
            }
        }
    }

    fn listing(entries: &[(&str, &str)]) -> Result<BTreeMap<String, ServiceInfo>> {
        Ok(entries
            .iter()
            .map(|(name, state)| {
                (
                    name.to_string(),
                    ServiceInfo::new("id", format!("demo-{name}-1"), *state, Vec::new()),
                )
            })
            .collect())
    }

    fn config(services: &[&str], target: ServiceStatus) -> WaitConfig {
        WaitConfig::new("demo", services.iter().copied())
            .with_timeout(Duration::from_secs(1))
            .with_poll_interval(Duration::from_millis(100))
            .with_target(target)
    }

    #[tokio::test]
    async fn test_healthy_satisfies_running_target() {
        let clock = Arc::new(ManualClock::default());
        let poller = ReadinessPoller::new(clock.clone());
        let lister = SequenceLister::new(vec![listing(&[("web", "Up 3 seconds (healthy)")])]);

        let status = poller
            .wait_for(&lister, &config(&["web"], ServiceStatus::Running))
            .await
            .unwrap();
        assert_eq!(status, ServiceStatus::Running);
        assert_eq!(lister.calls(), 1);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[tokio::test]
    async fn test_running_does_not_satisfy_healthy_target() {
        let clock = Arc::new(ManualClock::default());
        let poller = ReadinessPoller::new(clock.clone());
        let lister = SequenceLister::new(vec![listing(&[("web", "running")])]);

        let result = poller
            .wait_for(&lister, &config(&["web"], ServiceStatus::Healthy))
            .await;
        match result {
            Err(StackError::ServicesNotReady { unready, .. }) => assert_eq!(unready, vec!["web"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_uses_simulated_time() {
        let clock = Arc::new(ManualClock::default());
        let poller = ReadinessPoller::new(clock.clone());
        let lister =
            SequenceLister::new(vec![listing(&[("web", "running"), ("db", "Restarting (1)")])]);

        let started = std::time::Instant::now();
        let result = poller
            .wait_for(&lister, &config(&["web", "db"], ServiceStatus::Running))
            .await;

        match result {
            Err(StackError::ServicesNotReady {
                project,
                unready,
                timeout,
            }) => {
                assert_eq!(project, "demo");
                assert_eq!(unready, vec!["db"]);
                assert_eq!(timeout, Duration::from_secs(1));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        // 100ms 间隔、1s 超时：第 0ms..1000ms 每 100ms 检查一次
        assert_eq!(lister.calls(), 11);
        assert_eq!(clock.sleep_count(), 10);
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_becomes_ready_after_some_polls() {
        let clock = Arc::new(ManualClock::default());
        let poller = ReadinessPoller::new(clock.clone());
        let lister = SequenceLister::new(vec![
            listing(&[("web", "created")]),
            listing(&[("web", "Up 1 second (health: starting)")]),
            listing(&[("web", "Up 2 seconds (healthy)")]),
        ]);

        let status = poller
            .wait_for(&lister, &config(&["web"], ServiceStatus::Healthy))
            .await
            .unwrap();
        assert_eq!(status, ServiceStatus::Healthy);
        assert_eq!(lister.calls(), 3);
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_listing_errors_are_retried_until_deadline() {
        let clock = Arc::new(ManualClock::default());
        let poller = ReadinessPoller::new(clock.clone());
        let lister = SequenceLister::new(vec![
            Err(StackError::command_failed("ps", 1, "daemon hiccup")),
            Err(StackError::command_failed("ps", 1, "daemon hiccup")),
            listing(&[("web", "running")]),
        ]);

        let status = poller
            .wait_for(&lister, &config(&["web"], ServiceStatus::Running))
            .await
            .unwrap();
        assert_eq!(status, ServiceStatus::Running);
        assert_eq!(lister.calls(), 3);
    }

    #[tokio::test]
    async fn test_persistent_listing_errors_time_out() {
        let clock = Arc::new(ManualClock::default());
        let poller = ReadinessPoller::new(clock.clone());
        let lister = SequenceLister::new(vec![Err(StackError::command_failed("ps", 1, "down"))]);

        let result = poller
            .wait_for(&lister, &config(&["web"], ServiceStatus::Running))
            .await;
        assert!(matches!(result, Err(StackError::ServicesNotReady { .. })));
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_missing_service_is_unready() {
        let clock = Arc::new(ManualClock::default());
        let poller = ReadinessPoller::new(clock);
        let lister = SequenceLister::new(vec![listing(&[("web", "running")])]);

        let result = poller
            .wait_for(&lister, &config(&["web", "worker"], ServiceStatus::Running))
            .await;
        match result {
            Err(StackError::ServicesNotReady { unready, .. }) => {
                assert_eq!(unready, vec!["worker"])
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_polling() {
        let poller = ReadinessPoller::new(Arc::new(ManualClock::default()));
        let lister = SequenceLister::new(vec![listing(&[])]);
        let config = WaitConfig::new("demo", Vec::<String>::new());

        assert!(matches!(
            poller.wait_for(&lister, &config).await,
            Err(StackError::InvalidConfig(_))
        ));
        assert_eq!(lister.calls(), 0);
    }
}
