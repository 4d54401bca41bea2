//! 组调用调度器
//!
//! 负责把一次组调用展开为成员任务、在共享线程池上按缓冲/动态两阶段提交，
//! 并在所有任务完成后释放调用方。

pub mod barrier;
pub mod execution;
pub mod load_monitor;
pub mod metrics;
pub mod partitioner;
pub mod pool;
pub mod scheduler;
pub mod strategies;

#[cfg(test)]
mod strategies_test;

pub use barrier::CompletionBarrier;
pub use execution::{ExecutionContext, ExecutionUnit, JobKind, ResultSink};
pub use load_monitor::{compare_workers, WorkerLoadMonitor, WorkerSnapshot, WorkerState};
pub use metrics::DispatchMetrics;
pub use partitioner::{CallPartitioner, Partition, PartitionSettings};
pub use pool::WorkerPool;
pub use scheduler::{
    sequence_jobs, Collector, DispatchOptions, DispatchReport, Dispatcher, ScheduledJob,
};
pub use strategies::{
    routing_for, CustomRoutingAdapter, RandomRouting, RoundRobinRouting, RouteAssignment,
};
