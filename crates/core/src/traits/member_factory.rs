use async_trait::async_trait;
use serde_json::Value;

use crate::errors::InvocationFailure;
use crate::models::TargetRef;

/// 并发创建组成员
#[async_trait]
pub trait MemberFactory: Send + Sync {
    /// 使用给定参数创建第 `index` 个成员
    async fn create(&self, index: usize, params: &Value) -> Result<TargetRef, InvocationFailure>;

    fn name(&self) -> &str;
}
