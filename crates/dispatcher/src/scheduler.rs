use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use groupcall_core::{
    DispatchLogger, DispatchMode, DispatcherConfig, ExceptionBatch, GroupError, GroupResult,
    Invoker, MemberSnapshot, ResultGroup, Task,
};

use crate::barrier::CompletionBarrier;
use crate::execution::{ExecutionContext, ExecutionUnit, JobKind, ResultSink};
use crate::load_monitor::{WorkerLoadMonitor, WorkerSnapshot};
use crate::metrics::DispatchMetrics;
use crate::pool::WorkerPool;

/// 单次分派的生效选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub mode: DispatchMode,
    pub buffer_size: usize,
}

/// 分派结果的收集位置
#[derive(Debug, Clone, Copy)]
pub enum Collector<'a> {
    Results(&'a ResultGroup),
    Exceptions(&'a Arc<ExceptionBatch>),
}

/// 排好提交顺序的作业
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub task: Task,
    pub kind: JobKind,
    /// 是否在溢出阶段提交
    pub overflow: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub task_count: usize,
    pub pool_size: usize,
    pub buffered_jobs: usize,
    pub overflow_jobs: usize,
    pub dynamic_jobs: usize,
    pub worker_snapshots: Option<Vec<WorkerSnapshot>>,
}

/// 两阶段排序
///
/// 缓冲阶段进行 `buffer_size` 轮，每轮按成员槽位依次取出队列中第一个"目标成员
/// 本轮尚未分到任务"的任务，被跳过的任务保持原有顺序留在队列中，因此每个成员
/// 的队列按广度优先填满。剩余任务进入溢出阶段，可动态分派的任务作为动态作业
/// 提交，其余按预先路由作为缓冲作业提交。
pub fn sequence_jobs(tasks: Vec<Task>, member_count: usize, buffer_size: usize) -> Vec<ScheduledJob> {
    let mut queue: VecDeque<Task> = tasks.into();
    let mut jobs = Vec::with_capacity(queue.len());

    for _ in 0..buffer_size {
        if queue.is_empty() {
            break;
        }
        let mut served = vec![false; member_count];
        for _ in 0..member_count {
            let next = queue
                .iter()
                .position(|task| served.get(task.member).is_some_and(|served| !served));
            let Some(position) = next else {
                break;
            };
            if let Some(task) = queue.remove(position) {
                served[task.member] = true;
                jobs.push(ScheduledJob {
                    task,
                    kind: JobKind::Buffered,
                    overflow: false,
                });
            }
        }
    }

    jobs.extend(queue.into_iter().map(|task| {
        let kind = if task.dynamic {
            JobKind::Dynamic
        } else {
            JobKind::Buffered
        };
        ScheduledJob {
            task,
            kind,
            overflow: true,
        }
    }));
    jobs
}

pub struct Dispatcher {
    config: DispatcherConfig,
    pool: WorkerPool,
    invoker: Arc<dyn Invoker>,
    metrics: DispatchMetrics,
    group_name: Arc<str>,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        invoker: Arc<dyn Invoker>,
        group_name: &str,
        metrics_enabled: bool,
    ) -> Self {
        let pool = WorkerPool::new(config.pool_name.clone());
        Self {
            config,
            pool,
            invoker,
            metrics: DispatchMetrics::new(group_name, metrics_enabled),
            group_name: Arc::from(group_name),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    pub fn invoker(&self) -> &Arc<dyn Invoker> {
        &self.invoker
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    pub fn set_thread_pool_ratio(&mut self, ratio: usize) -> GroupResult<()> {
        if ratio == 0 {
            return Err(GroupError::config_error("成员与线程的比例必须大于0"));
        }
        self.config.thread_pool_ratio = ratio;
        Ok(())
    }

    pub fn set_extra_threads(&mut self, extra: usize) {
        self.config.extra_threads = extra;
    }

    /// 分派全部任务并等待完成屏障释放
    pub async fn dispatch(
        &self,
        method: &str,
        tasks: Vec<Task>,
        members: MemberSnapshot,
        options: DispatchOptions,
        collector: Collector<'_>,
    ) -> GroupResult<DispatchReport> {
        let started = Instant::now();
        let member_count = members.len();
        let task_count = tasks.len();

        if let Some(task) = tasks.iter().find(|task| task.member >= member_count) {
            return Err(GroupError::partitioning(format!(
                "任务 {} 路由到成员 {}，但组中只有 {} 个成员",
                task.slot, task.member, member_count
            )));
        }

        let pool_size = self
            .pool
            .ensure_workers(self.config.pool_size_for(member_count))
            .await;
        self.metrics.update_pool_size(pool_size);

        DispatchLogger::log_dispatch_start(
            &self.group_name,
            method,
            task_count,
            member_count,
            pool_size,
            options.mode.as_str(),
        );

        let monitor = (options.mode.needs_load_monitor() && member_count > 0).then(|| {
            let placeholders = members
                .iter()
                .enumerate()
                .filter(|(_, member)| member.is_failed())
                .map(|(index, _)| index);
            Arc::new(
                WorkerLoadMonitor::with_capacity(member_count, options.buffer_size)
                    .with_unavailable(placeholders),
            )
        });
        let barrier = Arc::new(CompletionBarrier::new(task_count));
        let ctx = Arc::new(ExecutionContext::new(
            members,
            Arc::clone(&self.invoker),
            Arc::clone(&barrier),
            monitor.clone(),
            self.metrics.clone(),
            Arc::clone(&self.group_name),
        ));

        let mut buffered_jobs = 0;
        let mut overflow_jobs = 0;
        let mut dynamic_jobs = 0;

        for job in sequence_jobs(tasks, member_count, options.buffer_size) {
            let sink = match collector {
                Collector::Results(results) => {
                    ResultSink::Slot(results.slot(job.task.slot).ok_or_else(|| {
                        GroupError::allocation(format!("结果组中不存在槽位 {}", job.task.slot))
                    })?)
                }
                Collector::Exceptions(batch) => ResultSink::Exceptions(Arc::clone(batch)),
            };
            let kind = match (job.kind, monitor.is_some()) {
                (JobKind::Dynamic, true) => JobKind::Dynamic,
                _ => JobKind::Buffered,
            };
            if job.overflow {
                overflow_jobs += 1;
            } else {
                buffered_jobs += 1;
            }
            if kind == JobKind::Dynamic {
                dynamic_jobs += 1;
            }
            let unit = ExecutionUnit::new(job.task, kind, sink, Arc::clone(&ctx));
            self.pool.submit(unit.run().boxed())?;
        }

        debug!(
            "已提交 {} 个作业: 缓冲 {}, 溢出 {}, 动态 {}",
            task_count, buffered_jobs, overflow_jobs, dynamic_jobs
        );

        barrier.wait().await;

        let faults = ctx.take_faults().await;
        if !faults.is_empty() {
            warn!("分派过程中出现 {} 个内部错误", faults.len());
            return Err(GroupError::allocation(faults.join("; ")));
        }

        let worker_snapshots = match &monitor {
            Some(monitor) => Some(monitor.snapshot().await),
            None => None,
        };

        let elapsed = started.elapsed();
        self.metrics.record_dispatch(task_count, elapsed.as_secs_f64());
        DispatchLogger::log_dispatch_complete(
            &self.group_name,
            method,
            task_count,
            elapsed.as_millis() as u64,
        );

        Ok(DispatchReport {
            task_count,
            pool_size,
            buffered_jobs,
            overflow_jobs,
            dynamic_jobs,
            worker_snapshots,
        })
    }

    /// 在线程池上并发执行一组作业，结果顺序与输入顺序一致
    pub async fn execute_all<T, F>(&self, jobs: Vec<F>) -> GroupResult<Vec<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let pool_size = self
            .pool
            .ensure_workers(self.config.pool_size_for(jobs.len()))
            .await;
        info!("在 {} 个执行线程上并发执行 {} 个作业", pool_size, jobs.len());

        let mut receivers = Vec::with_capacity(jobs.len());
        for job in jobs {
            let (tx, rx) = oneshot::channel();
            receivers.push(rx);
            self.pool.submit(
                async move {
                    let _ = tx.send(job.await);
                }
                .boxed(),
            )?;
        }

        let mut results = Vec::with_capacity(receivers.len());
        for (index, rx) in receivers.into_iter().enumerate() {
            let value = rx
                .await
                .map_err(|_| GroupError::allocation(format!("作业 {index} 未返回结果")))?;
            results.push(value);
        }
        Ok(results)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("invoker", &self.invoker.name())
            .finish()
    }
}
