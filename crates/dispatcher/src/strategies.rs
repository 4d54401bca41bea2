use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::debug;

use groupcall_core::{CustomRouting, DispatchMode, GroupError, GroupResult};

/// 任务到成员的初始路由分配
pub trait RouteAssignment: Send + Sync {
    /// 返回长度为 `task_count` 的路由表，第 i 项为任务 i 的目标成员下标
    fn assign(&self, task_count: usize, member_count: usize) -> GroupResult<Vec<usize>>;

    fn name(&self) -> &str;
}

/// 静态轮询：任务 i 路由到成员 `i mod 成员数`
pub struct RoundRobinRouting;

/// 静态随机：打乱轮询路由表
pub struct RandomRouting;

/// 将索引计算委托给外部提供的路由策略
pub struct CustomRoutingAdapter {
    inner: Arc<dyn CustomRouting>,
}

fn ensure_members(task_count: usize, member_count: usize) -> GroupResult<()> {
    if task_count > 0 && member_count == 0 {
        return Err(GroupError::partitioning(format!(
            "组中没有成员，无法分配 {task_count} 个任务"
        )));
    }
    Ok(())
}

impl RoundRobinRouting {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RoundRobinRouting {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteAssignment for RoundRobinRouting {
    fn assign(&self, task_count: usize, member_count: usize) -> GroupResult<Vec<usize>> {
        ensure_members(task_count, member_count)?;
        Ok((0..task_count).map(|i| i % member_count).collect())
    }

    fn name(&self) -> &str {
        "RoundRobin"
    }
}

impl RandomRouting {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RandomRouting {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteAssignment for RandomRouting {
    fn assign(&self, task_count: usize, member_count: usize) -> GroupResult<Vec<usize>> {
        let mut routes = RoundRobinRouting.assign(task_count, member_count)?;
        routes.shuffle(&mut rand::rng());
        debug!("随机路由表: {:?}", routes);
        Ok(routes)
    }

    fn name(&self) -> &str {
        "Random"
    }
}

impl CustomRoutingAdapter {
    pub fn new(inner: Arc<dyn CustomRouting>) -> Self {
        Self { inner }
    }
}

impl RouteAssignment for CustomRoutingAdapter {
    fn assign(&self, task_count: usize, member_count: usize) -> GroupResult<Vec<usize>> {
        ensure_members(task_count, member_count)?;
        (0..task_count)
            .map(|i| {
                let member = self.inner.route(i, task_count, member_count);
                if member >= member_count {
                    return Err(GroupError::partitioning(format!(
                        "自定义路由策略 {} 为任务 {} 返回了越界成员 {} (成员数: {})",
                        self.inner.name(),
                        i,
                        member,
                        member_count
                    )));
                }
                Ok(member)
            })
            .collect()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// 按有效分派模式选择路由策略
///
/// 动态模式的初始路由同样是轮询，真正的执行成员在运行时决定。
pub fn routing_for(
    mode: DispatchMode,
    custom: Option<&Arc<dyn CustomRouting>>,
) -> GroupResult<Box<dyn RouteAssignment>> {
    match mode {
        DispatchMode::Unspecified | DispatchMode::StaticRoundRobin | DispatchMode::Dynamic => {
            Ok(Box::new(RoundRobinRouting::new()))
        }
        DispatchMode::StaticRandom => Ok(Box::new(RandomRouting::new())),
        DispatchMode::Custom => custom
            .map(|inner| Box::new(CustomRoutingAdapter::new(Arc::clone(inner))) as Box<dyn RouteAssignment>)
            .ok_or_else(|| GroupError::partitioning("自定义分派模式需要提供路由策略")),
    }
}
