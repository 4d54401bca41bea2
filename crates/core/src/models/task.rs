use std::sync::Arc;

use crate::models::{CallKind, MemberCall, Payload};

/// 分区后的单个成员任务
#[derive(Debug, Clone)]
pub struct Task {
    /// 结果槽位下标，也是任务序号
    pub slot: usize,
    /// 预先路由到的成员下标；动态任务在执行前会被重新分配
    pub member: usize,
    pub method: Arc<str>,
    pub kind: CallKind,
    pub payload: Payload,
    /// 是否可在运行时由负载监视器选择执行成员
    pub dynamic: bool,
}

impl Task {
    pub fn member_call(&self) -> MemberCall {
        MemberCall {
            method: Arc::clone(&self.method),
            kind: self.kind,
            payload: self.payload.clone(),
        }
    }
}
