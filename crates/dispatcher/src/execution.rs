//! 执行单元
//!
//! 每个执行单元负责一个任务：确定执行成员、调用成员、把结果写入属于自己的
//! 槽位或异常收集器，最后让完成屏障减一。无论调用成功、失败、被跳过还是
//! panic，屏障都恰好减一次。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

use groupcall_core::{
    DispatchLogger, ExceptionBatch, ExceptionRecord, GroupError, GroupResult, InvocationFailure,
    Invoker, Member, MemberSnapshot, Outcome, ResultSlot, Task,
};

use crate::barrier::CompletionBarrier;
use crate::load_monitor::WorkerLoadMonitor;
use crate::metrics::DispatchMetrics;

/// 结果写入位置
#[derive(Debug, Clone)]
pub enum ResultSink {
    /// 有返回值调用：任务独占的结果槽位
    Slot(Arc<ResultSlot>),
    /// 单向/无返回值调用：共享的异常收集器
    Exceptions(Arc<ExceptionBatch>),
}

/// 一次分派内所有执行单元共享的上下文
pub struct ExecutionContext {
    pub members: MemberSnapshot,
    pub invoker: Arc<dyn Invoker>,
    pub barrier: Arc<CompletionBarrier>,
    pub monitor: Option<Arc<WorkerLoadMonitor>>,
    pub metrics: DispatchMetrics,
    pub group_name: Arc<str>,
    faults: Mutex<Vec<String>>,
}

impl ExecutionContext {
    pub fn new(
        members: MemberSnapshot,
        invoker: Arc<dyn Invoker>,
        barrier: Arc<CompletionBarrier>,
        monitor: Option<Arc<WorkerLoadMonitor>>,
        metrics: DispatchMetrics,
        group_name: Arc<str>,
    ) -> Self {
        Self {
            members,
            invoker,
            barrier,
            monitor,
            metrics,
            group_name,
            faults: Mutex::new(Vec::new()),
        }
    }

    async fn record_fault(&self, err: GroupError) {
        error!("执行单元内部错误: {}", err);
        self.faults.lock().await.push(err.to_string());
    }

    /// 取出执行期间的内部错误
    pub async fn take_faults(&self) -> Vec<String> {
        std::mem::take(&mut *self.faults.lock().await)
    }
}

/// 作业类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// 按预先路由的成员执行
    Buffered,
    /// 执行前由负载监视器挑选成员
    Dynamic,
}

pub struct ExecutionUnit {
    pub task: Task,
    pub kind: JobKind,
    sink: ResultSink,
    ctx: Arc<ExecutionContext>,
}

impl ExecutionUnit {
    pub fn new(task: Task, kind: JobKind, sink: ResultSink, ctx: Arc<ExecutionContext>) -> Self {
        Self {
            task,
            kind,
            sink,
            ctx,
        }
    }

    pub async fn run(self) {
        let ctx = Arc::clone(&self.ctx);
        if let Err(e) = self.execute().await {
            ctx.record_fault(e).await;
        }
        if let Err(e) = ctx.barrier.count_down() {
            ctx.record_fault(e).await;
        }
    }

    async fn execute(&self) -> GroupResult<()> {
        match (self.kind, self.ctx.monitor.as_ref()) {
            (JobKind::Dynamic, Some(monitor)) => {
                let member_index = monitor.reserve_worker(self.task.slot).await?;
                self.ctx.metrics.record_dynamic_pick();
                let delivered = self.invoke_member(member_index).await;
                let completed = monitor.on_completed(member_index).await;
                delivered?;
                completed
            }
            (JobKind::Dynamic, None) => Err(GroupError::allocation(format!(
                "动态作业 {} 缺少负载监视器",
                self.task.slot
            ))),
            (JobKind::Buffered, _) => self.invoke_member(self.task.member).await,
        }
    }

    async fn invoke_member(&self, member_index: usize) -> GroupResult<()> {
        let member = self.ctx.members.get(member_index).ok_or_else(|| {
            GroupError::allocation(format!(
                "任务 {} 路由到不存在的成员 {}",
                self.task.slot, member_index
            ))
        })?;

        let target = match member {
            Member::Target(target) => target,
            Member::Failed(_) => {
                debug!("成员 {} 为失败占位，跳过任务 {}", member_index, self.task.slot);
                return match &self.sink {
                    ResultSink::Slot(slot) => slot.resolve(member_index, Outcome::Skipped),
                    ResultSink::Exceptions(_) => Ok(()),
                };
            }
        };

        let mut call = self.task.member_call();
        if target.is_local() {
            call.payload = call.payload.defensive_copy()?;
        }

        let result = AssertUnwindSafe(self.ctx.invoker.invoke(target, &call))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(InvocationFailure::panicked(panic_message(&panic))));

        match result {
            Ok(value) => match &self.sink {
                ResultSink::Slot(slot) => slot.resolve(member_index, Outcome::Value(value)),
                ResultSink::Exceptions(_) => Ok(()),
            },
            Err(failure) => {
                DispatchLogger::log_member_failure(
                    &self.ctx.group_name,
                    &self.task.method,
                    member_index,
                    &failure,
                );
                self.ctx.metrics.record_member_failure();
                let failure = Arc::new(failure);
                match &self.sink {
                    ResultSink::Slot(slot) => slot.resolve(member_index, Outcome::Failed(failure)),
                    ResultSink::Exceptions(batch) => {
                        batch
                            .push(ExceptionRecord {
                                member_index,
                                target: Some(target.clone()),
                                failure,
                            })
                            .await;
                        Ok(())
                    }
                }
            }
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("成员调用 panic: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("成员调用 panic: {message}")
    } else {
        "成员调用 panic".to_string()
    }
}
