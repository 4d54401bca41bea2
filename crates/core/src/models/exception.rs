use tokio::sync::Mutex;

use crate::errors::{AggregateFailure, ExceptionRecord};

/// 单向/无返回值调用的异常收集器
///
/// 执行单元并发追加记录，屏障释放后由调用方一次性取出。
#[derive(Debug, Default)]
pub struct ExceptionBatch {
    records: Mutex<Vec<ExceptionRecord>>,
}

impl ExceptionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, record: ExceptionRecord) {
        self.records.lock().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// 取出全部记录并按成员下标排序，结果与完成顺序无关
    pub async fn take_failure(&self) -> AggregateFailure {
        let mut records = std::mem::take(&mut *self.records.lock().await);
        records.sort_by_key(|record| record.member_index);
        AggregateFailure::new(records)
    }
}
