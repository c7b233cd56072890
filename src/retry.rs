//! 重试与限流
//!
//! 指数退避策略、请求速率限制器，以及带退避的重试循环。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use crate::error::TranslationError;
use crate::types::RetryConfig;

/// 指数退避策略
///
/// 第 `attempt` 次失败后的等待时间：
/// `initial_delay * multiplier^(attempt - 1)`，不超过 `max_delay`。
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    rate_limit_multiplier: f64,
}

impl BackoffPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.initial_delay_ms)),
            multiplier: at_least_one(config.backoff_multiplier),
            rate_limit_multiplier: at_least_one(config.rate_limit_multiplier),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// 第 `attempt` 次（从1开始）失败后的基础等待时间
    ///
    /// ```rust
    /// use doc_translator::{BackoffPolicy, RetryConfig};
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::new(&RetryConfig {
    ///     max_attempts: 5,
    ///     initial_delay_ms: 100,
    ///     max_delay_ms: 350,
    ///     backoff_multiplier: 2.0,
    ///     rate_limit_multiplier: 2.0,
    /// });
    /// assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
    /// assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
    /// assert_eq!(policy.backoff_delay(3), Duration::from_millis(350));
    /// ```
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        self.scaled(self.multiplier.powi(exponent))
    }

    /// 针对具体错误的等待时间
    ///
    /// 限流错误在基础等待时间上再乘以 `rate_limit_multiplier`，
    /// 并且不短于服务商给出的 `Retry-After`（同样受上限约束）。
    pub fn delay_for(&self, attempt: usize, error: &TranslationError) -> Duration {
        match error {
            TranslationError::RateLimited { retry_after, .. } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
                let factor = self.multiplier.powi(exponent) * self.rate_limit_multiplier;
                let backoff = self.scaled(factor);
                let hinted = retry_after.unwrap_or_default().min(self.max_delay);
                backoff.max(hinted)
            }
            _ => self.backoff_delay(attempt),
        }
    }

    fn scaled(&self, factor: f64) -> Duration {
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

fn at_least_one(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier >= 1.0 {
        multiplier
    } else {
        1.0
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

/// 速率限制器
///
/// 保证相邻两次请求之间至少间隔 `1 / requests_per_second`。
/// 克隆出的实例共享同一个时间槽，适合多个分块任务共用。
#[derive(Clone)]
pub struct RateLimiter {
    next_slot: Arc<Mutex<Instant>>,
    interval: Option<Duration>,
}

impl RateLimiter {
    /// 创建新的速率限制器
    ///
    /// # 参数
    ///
    /// * `requests_per_second` - 每秒允许的最大请求数，`<= 0` 表示不限制
    ///
    /// # 示例
    ///
    /// ```rust
    /// use doc_translator::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(1.0); // 每秒1个请求
    /// ```
    pub fn new(requests_per_second: f64) -> Self {
        let interval = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            Some(Duration::from_secs_f64(1.0 / requests_per_second))
        } else {
            None
        };

        Self {
            next_slot: Arc::new(Mutex::new(Instant::now())),
            interval,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0.0)
    }

    /// 获取请求许可
    ///
    /// 在发起API请求前调用，必要时等待到下一个可用时间槽。
    pub async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + interval;
            slot
        };

        sleep_until(slot).await;
    }
}

/// 重试失败的原因
#[derive(Debug)]
pub enum RetryError {
    /// 不可重试的错误，立即放弃
    Fatal(TranslationError),
    /// 可重试错误用尽了尝试次数
    Exhausted {
        attempts: usize,
        last: TranslationError,
    },
}

impl RetryError {
    /// 转换为分块级别的错误
    pub fn into_chunk_error(self, chunk_index: usize) -> TranslationError {
        match self {
            RetryError::Fatal(error) => error,
            RetryError::Exhausted { attempts, last } => TranslationError::ChunkRetryExhausted {
                chunk_index,
                attempts,
                cause: Box::new(last),
            },
        }
    }
}

/// 带指数退避的重试机制
///
/// 只重试瞬时错误（网络错误、限流）；致命错误立即返回。
///
/// # 参数
///
/// * `operation` - 要执行的异步操作
/// * `policy` - 退避策略
/// * `rate_limiter` - 速率限制器，每次尝试前获取许可
/// * `on_retry` - 每次决定重试时回调 `(失败的尝试序号, 等待时间, 错误)`
pub async fn retry_with_backoff<F, Fut, T, R>(
    mut operation: F,
    policy: &BackoffPolicy,
    rate_limiter: &RateLimiter,
    mut on_retry: R,
) -> std::result::Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::error::Result<T>>,
    R: FnMut(usize, Duration, &TranslationError),
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        rate_limiter.acquire().await;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => {
                debug!("Attempt {} failed with fatal error: {}", attempt, e);
                return Err(RetryError::Fatal(e));
            }
            Err(e) if attempt >= policy.max_attempts() => {
                warn!("Attempt {} failed: {}. Giving up", attempt, e);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt, &e);
                warn!(
                    "Attempt {} failed: {}. Retrying in {}ms...",
                    attempt,
                    e,
                    delay.as_millis()
                );
                on_retry(attempt, delay, &e);
                sleep(delay).await;
            }
        }
    }
}
