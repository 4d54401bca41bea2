//! Test data builders
//!
//! Builder patterns for member lists and invocations with sensible defaults.

use serde_json::Value;

use groupcall_core::{
    Argument, CallKind, DispatchMode, Invocation, InvocationFailure, Member, TargetRef,
};

/// Builder for the member list of a test group
#[derive(Debug, Default)]
pub struct GroupBuilder {
    members: Vec<Member>,
}

impl GroupBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote members named after the given ids
    pub fn with_remote(mut self, ids: &[&str]) -> Self {
        self.members
            .extend(ids.iter().map(|id| Member::Target(TargetRef::remote(*id))));
        self
    }

    pub fn with_local(mut self, ids: &[&str]) -> Self {
        self.members
            .extend(ids.iter().map(|id| Member::Target(TargetRef::local(*id))));
        self
    }

    /// `count` remote members named `member-0`, `member-1`, ...
    pub fn with_members(mut self, count: usize) -> Self {
        let start = self.members.len();
        self.members.extend(
            (start..start + count).map(|i| Member::Target(TargetRef::remote(format!("member-{i}")))),
        );
        self
    }

    pub fn with_failed(mut self, message: &str) -> Self {
        self.members
            .push(Member::failed(InvocationFailure::application(message)));
        self
    }

    pub fn build(self) -> Vec<Member> {
        self.members
    }
}

/// Builder for test invocations
#[derive(Debug)]
pub struct InvocationBuilder {
    invocation: Invocation,
}

impl InvocationBuilder {
    pub fn new(method: &str) -> Self {
        Self {
            invocation: Invocation::value(method),
        }
    }

    pub fn with_kind(mut self, kind: CallKind) -> Self {
        self.invocation.kind = kind;
        self
    }

    pub fn one_way(self) -> Self {
        self.with_kind(CallKind::OneWay)
    }

    pub fn void(self) -> Self {
        self.with_kind(CallKind::Void)
    }

    pub fn with_arg(mut self, value: Value) -> Self {
        self.invocation.arguments.push(Argument::shared(value));
        self
    }

    pub fn with_scatter_arg(mut self, values: Vec<Value>) -> Self {
        self.invocation.arguments.push(Argument::scatter(values));
        self
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.invocation.options.dispatch_mode = Some(mode);
        self
    }

    pub fn with_scatter(mut self, scatter: bool) -> Self {
        self.invocation.options.scatter = Some(scatter);
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.invocation.options.buffer_size = Some(buffer_size);
        self
    }

    pub fn build(self) -> Invocation {
        self.invocation
    }
}
