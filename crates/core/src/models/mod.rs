pub mod exception;
pub mod invocation;
pub mod member;
pub mod result_group;
pub mod task;

pub use exception::ExceptionBatch;
pub use invocation::{
    Argument, CallKind, CallOptions, DispatchMode, IdentityOp, Invocation, MemberCall, Payload,
};
pub use member::{Locality, Member, MemberSnapshot, TargetRef};
pub use result_group::{Outcome, ResultGroup, ResultSlot, SlotRecord};
pub use task::Task;
