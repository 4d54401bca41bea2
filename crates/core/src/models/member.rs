use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::InvocationFailure;

/// 目标对象所在位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    /// 与调用方处于同一进程，参数需要防御性拷贝
    Local,
    /// 经由传输层访问，不存在别名问题
    Remote,
}

/// 不透明的目标对象引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRef {
    pub id: String,
    pub locality: Locality,
}

impl TargetRef {
    pub fn new<S: Into<String>>(id: S, locality: Locality) -> Self {
        Self {
            id: id.into(),
            locality,
        }
    }
    pub fn local<S: Into<String>>(id: S) -> Self {
        Self::new(id, Locality::Local)
    }
    pub fn remote<S: Into<String>>(id: S) -> Self {
        Self::new(id, Locality::Remote)
    }
    pub fn is_local(&self) -> bool {
        self.locality == Locality::Local
    }
}

// 目标引用按id比较，与位置无关
impl PartialEq for TargetRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TargetRef {}

impl std::hash::Hash for TargetRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// 组成员：目标引用，或之前调用留下的失败占位
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Target(TargetRef),
    Failed(Arc<InvocationFailure>),
}

impl Member {
    pub fn failed(failure: InvocationFailure) -> Self {
        Member::Failed(Arc::new(failure))
    }
    pub fn target(&self) -> Option<&TargetRef> {
        match self {
            Member::Target(target) => Some(target),
            Member::Failed(_) => None,
        }
    }
    pub fn failure(&self) -> Option<&Arc<InvocationFailure>> {
        match self {
            Member::Target(_) => None,
            Member::Failed(failure) => Some(failure),
        }
    }
    pub fn is_failed(&self) -> bool {
        matches!(self, Member::Failed(_))
    }
}

impl From<TargetRef> for Member {
    fn from(target: TargetRef) -> Self {
        Member::Target(target)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Target(target) => write!(f, "{target}"),
            Member::Failed(failure) => write!(f, "<failed: {}>", failure.message),
        }
    }
}

/// 一次调度期间成员列表的只读快照，下标即成员位置
pub type MemberSnapshot = Arc<Vec<Member>>;
