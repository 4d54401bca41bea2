/// 自定义分派模式下的路由策略
///
/// 给定任务序号、任务总数和成员数，返回该任务初始路由到的成员下标。
/// 返回越界下标会导致分区失败。
pub trait CustomRouting: Send + Sync {
    fn route(&self, task_index: usize, task_count: usize, member_count: usize) -> usize;

    fn name(&self) -> &str;
}
