use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// 时钟与休眠抽象
///
/// 轮询逻辑只通过该接口读取时间和休眠，测试中替换为 [`ManualClock`]
/// 即可在不消耗真实时间的情况下验证超时行为。
#[async_trait]
pub trait Clock: Send + Sync {
    /// 单调时间，用于计算已耗时
    fn now(&self) -> Instant;

    /// 墙上时间，用于生成项目名和记录启动时间
    fn wall_time(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// 使用真实时间的时钟
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 手动推进的时钟：`sleep` 立即返回并把时间向前拨动相应时长
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    offset: Mutex<Duration>,
    sleeps: AtomicU32,
}

impl ManualClock {
    pub fn new(wall_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Mutex::new(Duration::ZERO),
            sleeps: AtomicU32::new(0),
        }
    }

    /// 手动推进时间
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += duration;
    }

    /// 自创建以来经过的模拟时间
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `sleep` 被调用的次数
    pub fn sleep_count(&self) -> u32 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn wall_time(&self) -> DateTime<Utc> {
        let offset =
            chrono::Duration::from_std(self.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin + offset
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let wall = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(wall);
        let start = clock.now();

        clock.sleep(Duration::from_millis(250)).await;
        clock.sleep(Duration::from_millis(250)).await;

        assert_eq!(clock.sleep_count(), 2);
        assert_eq!(clock.now().duration_since(start), Duration::from_millis(500));
        assert_eq!(
            clock.wall_time(),
            wall + chrono::Duration::milliseconds(500)
        );
    }

    #[tokio::test]
    async fn test_system_clock_sleeps_for_real() {
        let clock = SystemClock;
        let start = clock.now();
        clock.sleep(Duration::from_millis(20)).await;
        assert!(clock.now().duration_since(start) >= Duration::from_millis(20));
    }
}
