// ==========================================
// 产线良率看板系统 - 重试策略
// ==========================================
// 职责: 为任意可失败操作提供有界的指数退避重试
// 约束: 只重试瞬时错误（连接中断、数据库忙）；业务错误立即返回
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 区分瞬时错误与永久错误
pub trait Transient {
    fn is_transient(&self) -> bool;
}

// ==========================================
// RetryPolicy - 重试策略
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 首次退避（毫秒）
    pub initial_backoff_ms: u64,
    /// 退避上限（毫秒）
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 5_000,
            max_backoff_ms: 80_000,
        }
    }
}

impl RetryPolicy {
    /// 不等待的策略（测试、手工补录）
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// 第 attempt 次（从 0 计）失败后的等待时长：initial * 2^attempt，封顶 max
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff = self
            .initial_backoff_ms
            .saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(backoff.min(self.max_backoff_ms))
    }

    /// 执行操作，瞬时错误按策略重试
    ///
    /// # 返回
    /// - Ok(T): 某次尝试成功
    /// - Err(RetryError::Permanent): 遇到非瞬时错误，未再重试
    /// - Err(RetryError::Exhausted): 用尽尝试次数
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => {
                    return Err(RetryError::Permanent {
                        attempts: attempt + 1,
                        source: err,
                    });
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!(operation = label, attempts = attempt, error = %err, "重试次数已用尽");
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }

                    let delay = self.backoff(attempt - 1);
                    warn!(
                        operation = label,
                        attempt = attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "操作失败，等待后重试"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

// ==========================================
// RetryError - 重试结果错误
// ==========================================
#[derive(Debug)]
pub enum RetryError<E> {
    /// 非瞬时错误，直接返回
    Permanent { attempts: u32, source: E },
    /// 瞬时错误且尝试次数用尽
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Permanent { source, .. } => source,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Permanent { source, .. } => write!(f, "{}", source),
            RetryError::Exhausted { attempts, last } => {
                write!(f, "重试 {} 次后仍失败: {}", attempts, last)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Permanent { source, .. } => Some(source),
            RetryError::Exhausted { last, .. } => Some(last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FakeError {
        transient: bool,
    }

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake(transient={})", self.transient)
        }
    }

    impl Transient for FakeError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(5_000));
        assert_eq!(policy.backoff(1), Duration::from_millis(10_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(40_000));
        assert_eq!(policy.backoff(10), Duration::from_millis(80_000));
    }

    #[tokio::test]
    async fn test_transient_error_retried_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::immediate(5);

        let result: Result<u32, RetryError<FakeError>> = policy
            .run("flaky", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(FakeError { transient: true })
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::immediate(5);

        let result: Result<(), RetryError<FakeError>> = policy
            .run("permanent", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FakeError { transient: false })
            })
            .await;

        let err = result.unwrap_err();
        assert!(!err.is_exhausted());
        assert_eq!(err.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::immediate(3);

        let result: Result<(), RetryError<FakeError>> = policy
            .run("down", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FakeError { transient: true })
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
