use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

use groupcall_core::{GroupError, GroupResult};

/// 完成屏障：计数初始化为任务数，每个任务结束时减一，归零时释放调用方
#[derive(Debug)]
pub struct CompletionBarrier {
    total: usize,
    remaining: AtomicUsize,
    released: Notify,
}

impl CompletionBarrier {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            remaining: AtomicUsize::new(total),
            released: Notify::new(),
        }
    }

    /// 标记一个任务完成（成功、失败或跳过都算）
    pub fn count_down(&self) -> GroupResult<()> {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                remaining.checked_sub(1)
            })
            .map_err(|_| GroupError::allocation("完成计数器已为0，任务完成次数超过任务数"))?;

        if previous == 1 {
            self.released.notify_waiters();
        }
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> usize {
        self.total - self.remaining()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_released(&self) -> bool {
        self.remaining() == 0
    }

    /// 阻塞直到计数归零；没有超时
    pub async fn wait(&self) {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_released() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_barrier_is_released() {
        let barrier = CompletionBarrier::new(0);
        assert!(barrier.is_released());
        barrier.wait().await;
    }

    #[tokio::test]
    async fn test_barrier_releases_after_all_count_downs() {
        let barrier = Arc::new(CompletionBarrier::new(3));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    barrier.count_down().unwrap();
                })
            })
            .collect();

        barrier.wait().await;
        assert_eq!(barrier.completed(), 3);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[test]
    fn test_count_down_past_zero_is_allocation_error() {
        let barrier = CompletionBarrier::new(1);
        barrier.count_down().unwrap();

        let err = barrier.count_down().unwrap_err();
        assert!(matches!(err, GroupError::Allocation(_)));
        assert_eq!(barrier.remaining(), 0);
    }
}
