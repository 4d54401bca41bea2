//! 组成员容器
//!
//! 有序的成员序列，支持按名称绑定成员、集合运算和区间截取。成员之间按目标
//! 标识比较，失败占位与任何成员都不相等。

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use groupcall_core::{IdentityOp, InvocationFailure, Member, MemberSnapshot, TargetRef};

#[derive(Debug, Clone, Default)]
pub struct Group {
    members: Vec<Member>,
    names: BTreeMap<String, usize>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_members(members: Vec<Member>) -> Self {
        Self {
            members,
            names: BTreeMap::new(),
        }
    }

    pub fn from_targets<I: IntoIterator<Item = TargetRef>>(targets: I) -> Self {
        Self::from_members(targets.into_iter().map(Member::Target).collect())
    }

    /// 追加成员，返回其下标
    pub fn add(&mut self, target: TargetRef) -> usize {
        self.members.push(Member::Target(target));
        self.members.len() - 1
    }

    /// 追加失败占位
    pub fn add_failed(&mut self, failure: InvocationFailure) -> usize {
        self.members.push(Member::failed(failure));
        self.members.len() - 1
    }

    pub fn push(&mut self, member: Member) -> usize {
        self.members.push(member);
        self.members.len() - 1
    }

    /// 把另一个组的全部成员展开追加到本组
    pub fn add_merge(&mut self, other: &Group) {
        self.members.extend(other.members.iter().cloned());
    }

    /// 删除指定位置的成员，之后的名称绑定全部前移一位
    pub fn remove(&mut self, index: usize) -> Option<Member> {
        if index >= self.members.len() {
            return None;
        }
        self.names.retain(|_, bound| *bound != index);
        for bound in self.names.values_mut() {
            if *bound > index {
                *bound -= 1;
            }
        }
        Some(self.members.remove(index))
    }

    /// 删除第一个与目标相同的成员
    pub fn remove_target(&mut self, target: &TargetRef) -> bool {
        match self.index_of(target) {
            Some(index) => self.remove(index).is_some(),
            None => false,
        }
    }

    /// 按下标批量删除，下标可以重复、无序
    pub fn remove_indices(&mut self, indices: &[usize]) -> Vec<usize> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let mut removed = Vec::with_capacity(sorted.len());
        for index in sorted.into_iter().rev() {
            if self.remove(index).is_some() {
                removed.push(index);
            }
        }
        removed.reverse();
        removed
    }

    pub fn get(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    pub fn index_of(&self, target: &TargetRef) -> Option<usize> {
        self.members
            .iter()
            .position(|member| member.target() == Some(target))
    }

    pub fn contains(&self, target: &TargetRef) -> bool {
        self.index_of(target).is_some()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.names.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// 失败占位成员的下标
    pub fn failed_indices(&self) -> Vec<usize> {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, member)| member.is_failed())
            .map(|(index, _)| index)
            .collect()
    }

    /// 分派期间使用的不可变成员快照
    pub fn snapshot(&self) -> MemberSnapshot {
        Arc::new(self.members.clone())
    }

    // 命名成员

    /// 绑定名称；名称已存在时替换原位置上的成员
    pub fn add_named(&mut self, key: &str, target: TargetRef) -> usize {
        if let Some(&index) = self.names.get(key) {
            self.members[index] = Member::Target(target);
            return index;
        }
        let index = self.add(target);
        self.names.insert(key.to_string(), index);
        index
    }

    pub fn get_named(&self, key: &str) -> Option<&Member> {
        self.names.get(key).and_then(|&index| self.members.get(index))
    }

    /// 删除名称及其绑定的成员
    pub fn remove_named(&mut self, key: &str) -> Option<Member> {
        let index = *self.names.get(key)?;
        self.remove(index)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.names.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.names.keys().map(String::as_str).collect()
    }

    // 集合运算

    /// 两个组的全部成员
    pub fn union(&self, other: &Group) -> Group {
        let mut result = self.plain_copy();
        result.add_merge(other);
        result
    }

    /// 同时属于两个组的成员
    pub fn intersection(&self, other: &Group) -> Group {
        self.filtered(|member| other.contains_member(member))
    }

    /// 属于本组但不属于另一组的成员
    pub fn exclude(&self, other: &Group) -> Group {
        self.filtered(|member| !other.contains_member(member))
    }

    /// 只属于其中一个组的成员
    pub fn difference(&self, other: &Group) -> Group {
        let mut result = self.exclude(other);
        result.add_merge(&other.exclude(self));
        result
    }

    /// 截取 `[begin, end]` 闭区间，越界部分被截断；`begin > end` 时返回 None
    pub fn range(&self, begin: usize, end: usize) -> Option<Group> {
        if begin > end {
            debug!("区间参数无效: {} > {}", begin, end);
            return None;
        }
        if begin >= self.members.len() {
            return Some(Group::new());
        }
        let end = end.min(self.members.len() - 1);
        Some(Group::from_members(self.members[begin..=end].to_vec()))
    }

    fn contains_member(&self, member: &Member) -> bool {
        member.target().is_some_and(|target| self.contains(target))
    }

    fn filtered<F: Fn(&Member) -> bool>(&self, keep: F) -> Group {
        Group::from_members(
            self.members
                .iter()
                .filter(|member| keep(member))
                .cloned()
                .collect(),
        )
    }

    fn plain_copy(&self) -> Group {
        Group::from_members(self.members.clone())
    }

    // 身份类操作

    pub fn hash_code(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// 组的 JSON 描述：按顺序列出成员
    pub fn describe(&self) -> Value {
        Value::Array(
            self.members
                .iter()
                .map(|member| Value::String(member.to_string()))
                .collect(),
        )
    }

    /// 在本地回答身份类操作，不会分派到成员
    pub fn answer(&self, op: &IdentityOp) -> Value {
        match op {
            IdentityOp::ToString => Value::String(self.to_string()),
            IdentityOp::HashCode => Value::from(self.hash_code()),
            IdentityOp::Equals(other) => Value::Bool(*other == self.describe()),
        }
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .zip(&other.members)
                .all(|(a, b)| match (a.target(), b.target()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                })
    }
}

impl Hash for Group {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for member in &self.members {
            match member.target() {
                Some(target) => target.hash(state),
                None => "<failed>".hash(state),
            }
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Group[")?;
        for (index, member) in self.members.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{member}")?;
        }
        write!(f, "]")
    }
}

impl<'a> IntoIterator for &'a Group {
    type Item = &'a Member;
    type IntoIter = std::slice::Iter<'a, Member>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}
