//! 组调用入口
//!
//! [`GroupHandle`] 持有组成员和配置，把一次逻辑调用交给分区器和调度器执行，
//! 然后根据自动清理策略返回结果组或抛出聚合失败。

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use groupcall_core::{
    AppConfig, CustomRouting, DispatchLogger, ExceptionBatch, GroupConfig, GroupError,
    GroupResult, Invocation, Invoker, Member, MemberFactory, ResultGroup,
};
use groupcall_dispatcher::{
    CallPartitioner, Collector, DispatchOptions, DispatchReport, Dispatcher, PartitionSettings,
};

use crate::group::Group;

/// `reify` 的返回值
#[derive(Debug)]
pub enum Reply {
    /// 身份类操作在本地得到的答案
    Identity(Value),
    /// 有返回值调用的结果组，返回时所有槽位都已写入
    Results(ResultGroup),
    /// 单向/无返回值调用正常结束
    Completed,
}

impl Reply {
    pub fn into_results(self) -> Option<ResultGroup> {
        match self {
            Reply::Results(results) => Some(results),
            _ => None,
        }
    }

    pub fn into_identity(self) -> Option<Value> {
        match self {
            Reply::Identity(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Reply::Completed)
    }
}

pub struct GroupHandle {
    id: Uuid,
    group: Group,
    config: GroupConfig,
    dispatcher: Dispatcher,
    partitioner: CallPartitioner,
    last_report: Option<DispatchReport>,
}

impl GroupHandle {
    pub fn new(config: &AppConfig, invoker: Arc<dyn Invoker>) -> Self {
        let dispatcher = Dispatcher::new(
            config.dispatcher.clone(),
            invoker,
            &config.group.name,
            config.observability.metrics_enabled,
        );
        let id = Uuid::new_v4();
        debug!("创建组 {} ({})", config.group.name, id);
        Self {
            id,
            group: Group::new(),
            config: config.group.clone(),
            dispatcher,
            partitioner: CallPartitioner::new(),
            last_report: None,
        }
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.group = group;
        self
    }

    pub fn with_members(self, members: Vec<Member>) -> Self {
        self.with_group(Group::from_members(members))
    }

    pub fn with_custom_routing(mut self, routing: Arc<dyn CustomRouting>) -> Self {
        self.partitioner.set_custom_routing(Some(routing));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn group_mut(&mut self) -> &mut Group {
        &mut self.group
    }

    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    pub fn set_auto_purge(&mut self, auto_purge: bool) {
        self.config.auto_purge = auto_purge;
    }

    pub fn set_scatter(&mut self, scatter: bool) {
        self.config.scatter = scatter;
    }

    pub fn set_unique_serialization(&mut self, unique: bool) {
        self.config.unique_serialization = unique;
    }

    pub fn set_ratio_member_to_thread(&mut self, ratio: usize) -> GroupResult<()> {
        self.dispatcher.set_thread_pool_ratio(ratio)
    }

    pub fn set_additional_threads(&mut self, extra: usize) {
        self.dispatcher.set_extra_threads(extra);
    }

    pub fn pool_size(&self) -> usize {
        self.dispatcher.pool_size()
    }

    /// 最近一次分派的报告
    pub fn last_report(&self) -> Option<&DispatchReport> {
        self.last_report.as_ref()
    }

    /// 执行一次组调用，直到所有成员任务结束才返回
    pub async fn reify(&mut self, invocation: Invocation) -> GroupResult<Reply> {
        if let Some(op) = invocation.identity_op() {
            debug!("身份类操作 {} 在本地处理", invocation.method);
            return Ok(Reply::Identity(self.group.answer(&op)));
        }

        let span = info_span!(
            "group_reify",
            group = %self.config.name,
            method = %invocation.method,
            kind = ?invocation.kind
        );
        self.dispatch_invocation(invocation).instrument(span).await
    }

    async fn dispatch_invocation(&mut self, invocation: Invocation) -> GroupResult<Reply> {
        let settings = PartitionSettings {
            mode: invocation
                .options
                .dispatch_mode
                .unwrap_or(self.config.dispatch_mode),
            scatter: invocation.options.scatter.unwrap_or(self.config.scatter),
            unique_serialization: self.config.unique_serialization,
        };
        let options = DispatchOptions {
            mode: settings.mode,
            buffer_size: invocation
                .options
                .buffer_size
                .unwrap_or(self.dispatcher.config().buffer_size),
        };

        let members = self.group.snapshot();
        let partition = self
            .partitioner
            .partition(&invocation, members.len(), &settings)?;
        DispatchLogger::log_partitioned(
            &self.config.name,
            &invocation.method,
            partition.tasks.len(),
            partition.scatter,
        );

        if invocation.kind.returns_value() {
            let mut results = ResultGroup::pending(partition.tasks.len());
            let report = self
                .dispatcher
                .dispatch(
                    &invocation.method,
                    partition.tasks,
                    members,
                    options,
                    Collector::Results(&results),
                )
                .await?;
            self.last_report = Some(report);

            if self.config.auto_purge {
                let mut doomed = results.failed_members();
                doomed.extend(self.group.failed_indices());
                self.purge_members(&doomed);
                let purged = results.purge_failures();
                debug!("结果组中移除了 {} 个异常结果", purged);
            }
            return Ok(Reply::Results(results));
        }

        let batch = Arc::new(ExceptionBatch::new());
        let report = self
            .dispatcher
            .dispatch(
                &invocation.method,
                partition.tasks,
                members,
                options,
                Collector::Exceptions(&batch),
            )
            .await?;
        self.last_report = Some(report);

        let failure = batch.take_failure().await;
        if self.config.auto_purge {
            let mut doomed = failure.member_indices();
            doomed.extend(self.group.failed_indices());
            self.purge_members(&doomed);
            return Ok(Reply::Completed);
        }
        if !failure.is_empty() {
            warn!(
                "组 {} 的调用 {} 有 {} 个成员失败",
                self.config.name,
                invocation.method,
                failure.len()
            );
            return Err(GroupError::Aggregate(failure));
        }
        Ok(Reply::Completed)
    }

    fn purge_members(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let removed = self.group.remove_indices(indices);
        if removed.is_empty() {
            return;
        }
        self.dispatcher.metrics().record_purge(removed.len());
        DispatchLogger::log_purge(&self.config.name, &removed, self.group.len());
    }

    /// 在线程池上并发创建成员，按参数顺序追加到组中
    ///
    /// 创建失败的成员以失败占位的形式加入，返回成功创建的数量。
    pub async fn create_members(
        &mut self,
        factory: Arc<dyn MemberFactory>,
        params: Vec<Value>,
    ) -> GroupResult<usize> {
        let base = self.group.len();
        let jobs = params
            .into_iter()
            .enumerate()
            .map(|(offset, params)| {
                let factory = Arc::clone(&factory);
                async move { factory.create(base + offset, &params).await }
            })
            .collect::<Vec<_>>();

        let created = self.dispatcher.execute_all(jobs).await?;
        let mut succeeded = 0;
        for outcome in created {
            match outcome {
                Ok(target) => {
                    self.group.add(target);
                    succeeded += 1;
                }
                Err(failure) => {
                    warn!("成员创建失败: {}", failure);
                    self.group.add_failed(failure);
                }
            }
        }
        info!(
            "组 {} 通过 {} 创建了 {} 个成员，当前成员数 {}",
            self.config.name,
            factory.name(),
            succeeded,
            self.group.len()
        );
        Ok(succeeded)
    }
}

impl std::fmt::Debug for GroupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupHandle")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("members", &self.group.len())
            .finish()
    }
}

// 身份类比较只看成员
impl PartialEq for GroupHandle {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group
    }
}

impl std::fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.group)
    }
}

