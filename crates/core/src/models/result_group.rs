//! 结果组
//!
//! 有返回值的组调用把每个成员的结果写入结果组中属于它的槽位。每个槽位初始为
//! "等待中"，由唯一拥有它的执行单元写入且只写入一次。异常作为普通结果值保存，
//! 直到调用方检查它们。

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tokio::sync::Notify;

use crate::errors::{AggregateFailure, ExceptionRecord, GroupError, GroupResult, InvocationFailure};

/// 槽位中的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Value),
    /// 成员已是失败占位，调用被跳过
    Skipped,
    Failed(Arc<InvocationFailure>),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
    /// 成员返回了空值，或调用被跳过而没有结果
    pub fn is_null(&self) -> bool {
        matches!(self, Outcome::Skipped | Outcome::Value(Value::Null))
    }
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// 已写入槽位的记录，附带实际执行该任务的成员下标
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRecord {
    pub member_index: usize,
    pub outcome: Outcome,
}

/// 单个结果槽位
#[derive(Debug)]
pub struct ResultSlot {
    record: OnceLock<SlotRecord>,
    arrived: Arc<Notify>,
}

impl ResultSlot {
    fn new(arrived: Arc<Notify>) -> Self {
        Self {
            record: OnceLock::new(),
            arrived,
        }
    }

    /// 写入槽位；重复写入说明调度状态已被破坏
    pub fn resolve(&self, member_index: usize, outcome: Outcome) -> GroupResult<()> {
        self.record
            .set(SlotRecord {
                member_index,
                outcome,
            })
            .map_err(|_| GroupError::allocation("结果槽位被重复写入"))?;
        self.arrived.notify_waiters();
        Ok(())
    }

    pub fn get(&self) -> Option<&SlotRecord> {
        self.record.get()
    }

    pub fn is_awaited(&self) -> bool {
        self.record.get().is_none()
    }
}

/// 有序结果集合，长度等于任务数
#[derive(Debug)]
pub struct ResultGroup {
    slots: Vec<Arc<ResultSlot>>,
    arrived: Arc<Notify>,
}

impl ResultGroup {
    /// 创建全部处于等待状态的结果组
    pub fn pending(size: usize) -> Self {
        let arrived = Arc::new(Notify::new());
        let slots = (0..size)
            .map(|_| Arc::new(ResultSlot::new(Arc::clone(&arrived))))
            .collect();
        Self { slots, arrived }
    }

    pub fn slot(&self, index: usize) -> Option<Arc<ResultSlot>> {
        self.slots.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 获取第 `index` 个结果；等待中或越界时返回 `None`
    pub fn get(&self, index: usize) -> Option<&Outcome> {
        self.record(index).map(|record| &record.outcome)
    }

    pub fn record(&self, index: usize) -> Option<&SlotRecord> {
        self.slots.get(index).and_then(|slot| slot.get())
    }

    pub fn is_awaited(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .map(|slot| slot.is_awaited())
            .unwrap_or(false)
    }

    pub fn all_arrived(&self) -> bool {
        self.slots.iter().all(|slot| !slot.is_awaited())
    }

    pub fn all_awaited(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_awaited())
    }

    async fn wait_until<F>(&self, ready: F)
    where
        F: Fn(&Self) -> bool,
    {
        loop {
            let notified = self.arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if ready(self) {
                return;
            }
            notified.await;
        }
    }

    /// 等待全部结果到达
    pub async fn wait_all(&self) {
        self.wait_until(|group| group.all_arrived()).await;
    }

    /// 等待任意一个结果到达并返回其下标；空结果组返回 `None`
    pub async fn wait_one(&self) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        self.wait_until(|group| group.slots.iter().any(|slot| !slot.is_awaited()))
            .await;
        self.slots.iter().position(|slot| !slot.is_awaited())
    }

    pub async fn wait_one_and_get_index(&self) -> Option<usize> {
        self.wait_one().await
    }

    /// 等待第 `n` 个结果
    pub async fn wait_the_nth(&self, n: usize) {
        if n >= self.slots.len() {
            return;
        }
        self.wait_until(|group| !group.slots[n].is_awaited()).await;
    }

    pub async fn wait_and_get_the_nth(&self, n: usize) -> Option<Outcome> {
        self.wait_the_nth(n).await;
        self.get(n).cloned()
    }

    /// 等待前 `n` 个结果
    pub async fn wait_n(&self, n: usize) {
        let n = n.min(self.slots.len());
        self.wait_until(|group| group.slots[..n].iter().all(|slot| !slot.is_awaited()))
            .await;
    }

    /// 等待任意一个结果到达并返回该结果
    pub async fn wait_and_get_one(&self) -> Option<Outcome> {
        let index = self.wait_one().await?;
        self.get(index).cloned()
    }

    /// 等待任意一个结果到达，将其从结果组中移除后返回
    pub async fn wait_and_get_one_then_remove_it(&mut self) -> Option<Outcome> {
        let index = self.wait_one().await?;
        let slot = self.slots.remove(index);
        slot.get().map(|record| record.outcome.clone())
    }

    /// 成功的结果值，按槽位顺序
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.slots
            .iter()
            .filter_map(|slot| slot.get())
            .filter_map(|record| record.outcome.as_value())
    }

    pub fn outcomes(&self) -> Vec<Option<Outcome>> {
        self.slots
            .iter()
            .map(|slot| slot.get().map(|record| record.outcome.clone()))
            .collect()
    }

    /// 槽位中以异常结束或因失败占位被跳过的成员下标（去重、升序）
    pub fn failed_members(&self) -> Vec<usize> {
        let mut members: Vec<usize> = self
            .slots
            .iter()
            .filter_map(|slot| slot.get())
            .filter(|record| record.outcome.is_failed() || record.outcome.is_skipped())
            .map(|record| record.member_index)
            .collect();
        members.sort_unstable();
        members.dedup();
        members
    }

    /// 以槽位下标汇总结果中的异常
    pub fn exception_list(&self) -> AggregateFailure {
        let records = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot.get() {
                Some(SlotRecord {
                    outcome: Outcome::Failed(failure),
                    ..
                }) => Some(ExceptionRecord {
                    member_index: index,
                    target: None,
                    failure: Arc::clone(failure),
                }),
                _ => None,
            })
            .collect();
        AggregateFailure::new(records)
    }

    /// 移除异常和被跳过的槽位，成员返回的空值保留
    pub fn purge_failures(&mut self) -> usize {
        self.retain_outcomes(|outcome| !(outcome.is_failed() || outcome.is_skipped()))
    }

    /// 移除异常和空值槽位，返回被移除的数量
    pub fn purge_exceptions_and_nulls(&mut self) -> usize {
        self.retain_outcomes(|outcome| !(outcome.is_failed() || outcome.is_null()))
    }

    fn retain_outcomes<F>(&mut self, keep: F) -> usize
    where
        F: Fn(&Outcome) -> bool,
    {
        let before = self.slots.len();
        self.slots.retain(|slot| match slot.get() {
            Some(record) => keep(&record.outcome),
            None => true,
        });
        before - self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_slot_written_exactly_once() {
        let group = ResultGroup::pending(1);
        let slot = group.slot(0).unwrap();

        slot.resolve(0, Outcome::Value(json!(1))).unwrap();
        let err = slot.resolve(0, Outcome::Value(json!(2))).unwrap_err();

        assert!(matches!(err, GroupError::Allocation(_)));
        assert_eq!(group.get(0), Some(&Outcome::Value(json!(1))));
    }

    #[test]
    fn test_arrival_predicates() {
        let group = ResultGroup::pending(2);
        assert!(group.all_awaited());
        assert!(!group.all_arrived());

        group.slot(0).unwrap().resolve(0, Outcome::Skipped).unwrap();
        assert!(!group.all_awaited());
        assert!(!group.all_arrived());
        assert!(group.is_awaited(1));

        group.slot(1).unwrap().resolve(1, Outcome::Value(json!("b"))).unwrap();
        assert!(group.all_arrived());
    }

    #[tokio::test]
    async fn test_wait_one_returns_first_arrived_index() {
        let group = Arc::new(ResultGroup::pending(3));
        let slot = group.slot(2).unwrap();

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            slot.resolve(2, Outcome::Value(json!(42))).unwrap();
        });

        assert_eq!(group.wait_one().await, Some(2));
        writer.await.unwrap();
        assert_eq!(
            group.wait_and_get_the_nth(2).await,
            Some(Outcome::Value(json!(42)))
        );
    }

    #[tokio::test]
    async fn test_wait_all_and_wait_n() {
        let group = Arc::new(ResultGroup::pending(3));
        let slots: Vec<_> = (0..3).map(|i| group.slot(i).unwrap()).collect();

        let writer = tokio::spawn(async move {
            for (i, slot) in slots.into_iter().enumerate() {
                tokio::time::sleep(Duration::from_millis(5)).await;
                slot.resolve(i, Outcome::Value(json!(i))).unwrap();
            }
        });

        group.wait_n(2).await;
        assert!(!group.is_awaited(0));
        assert!(!group.is_awaited(1));
        group.wait_all().await;
        assert!(group.all_arrived());
        writer.await.unwrap();
    }

    fn mixed_group() -> ResultGroup {
        let group = ResultGroup::pending(5);
        group.slot(0).unwrap().resolve(0, Outcome::Value(json!("a"))).unwrap();
        group
            .slot(1)
            .unwrap()
            .resolve(1, Outcome::Failed(Arc::new(InvocationFailure::application("x"))))
            .unwrap();
        group.slot(2).unwrap().resolve(2, Outcome::Skipped).unwrap();
        group.slot(3).unwrap().resolve(3, Outcome::Value(Value::Null)).unwrap();
        group.slot(4).unwrap().resolve(4, Outcome::Value(json!("e"))).unwrap();
        group
    }

    #[test]
    fn test_purge_exceptions_and_nulls() {
        let mut group = mixed_group();

        assert_eq!(group.exception_list().member_indices(), vec![1]);
        assert_eq!(group.purge_exceptions_and_nulls(), 3);
        let values: Vec<_> = group.values().cloned().collect();
        assert_eq!(values, vec![json!("a"), json!("e")]);
    }

    #[test]
    fn test_null_return_is_not_a_failure() {
        let mut group = mixed_group();

        assert_eq!(group.failed_members(), vec![1, 2]);
        assert_eq!(group.purge_failures(), 2);
        let values: Vec<_> = group.values().cloned().collect();
        assert_eq!(values, vec![json!("a"), Value::Null, json!("e")]);
    }

    #[tokio::test]
    async fn test_wait_and_get_one_then_remove_it() {
        let mut group = ResultGroup::pending(3);
        let slot = group.slot(1).unwrap();

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            slot.resolve(1, Outcome::Value(json!("b"))).unwrap();
        });

        assert_eq!(group.wait_and_get_one().await, Some(Outcome::Value(json!("b"))));
        assert_eq!(
            group.wait_and_get_one_then_remove_it().await,
            Some(Outcome::Value(json!("b")))
        );
        writer.await.unwrap();
        assert_eq!(group.len(), 2);
        assert!(group.all_awaited());
    }
}
