//! 组通信
//!
//! 对外的组调用入口：组成员容器与 [`GroupHandle`]。
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use groupcall_core::{AppConfig, Invocation, TargetRef};
//! use groupcall_group::{Group, GroupHandle};
//! # async fn demo(invoker: Arc<dyn groupcall_core::Invoker>) -> groupcall_core::GroupResult<()> {
//! let group = Group::from_targets(vec![TargetRef::remote("a"), TargetRef::remote("b")]);
//! let mut handle = GroupHandle::new(&AppConfig::default(), invoker).with_group(group);
//! let reply = handle.reify(Invocation::value("status")).await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

pub mod group;
pub mod handle;

pub use group::Group;
pub use handle::{GroupHandle, Reply};
