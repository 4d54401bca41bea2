//! 成员调用接口定义
//!
//! 组调度引擎本身不负责跨进程或网络的编组与传输，真正的调用能力由外部的
//! 传输/远程层以 [`Invoker`] 的形式提供。
//!
//! ## 使用示例
//!
//! ```rust
//! use async_trait::async_trait;
//! use groupcall_core::errors::InvocationFailure;
//! use groupcall_core::models::{MemberCall, TargetRef};
//! use groupcall_core::traits::Invoker;
//! use serde_json::Value;
//!
//! pub struct EchoInvoker;
//!
//! #[async_trait]
//! impl Invoker for EchoInvoker {
//!     async fn invoke(
//!         &self,
//!         target: &TargetRef,
//!         call: &MemberCall,
//!     ) -> Result<Value, InvocationFailure> {
//!         let args = call
//!             .payload
//!             .arguments()
//!             .map_err(|e| InvocationFailure::transport(e.to_string()))?;
//!         Ok(Value::String(format!("{}:{}:{}", target.id, call.method, args.len())))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::InvocationFailure;
use crate::models::{MemberCall, TargetRef};

/// 对单个目标执行一次调用
///
/// 调用可以同步阻塞任意长时间，引擎不会取消或超时。
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, target: &TargetRef, call: &MemberCall)
        -> Result<Value, InvocationFailure>;

    fn name(&self) -> &str;
}
