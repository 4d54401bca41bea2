use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TargetRef;

/// 组调度引擎错误类型定义
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("参数分区失败: {0}")]
    Partitioning(String),

    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),

    #[error("内部调度分配错误: {0}")]
    Allocation(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl GroupError {
    pub fn partitioning<S: Into<String>>(msg: S) -> Self {
        Self::Partitioning(msg.into())
    }
    pub fn allocation<S: Into<String>>(msg: S) -> Self {
        Self::Allocation(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 致命错误表示调用方无法通过重试恢复
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GroupError::Partitioning(_) | GroupError::Allocation(_) | GroupError::Configuration(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            GroupError::Partitioning(_) => "无法为调用计算有效的成员分配",
            GroupError::Aggregate(_) => "部分组成员调用失败",
            GroupError::Allocation(_) => "调度器内部状态异常",
            GroupError::Configuration(_) => "组调度配置有误",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for GroupError {
    fn from(err: serde_json::Error) -> Self {
        GroupError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for GroupError {
    fn from(err: anyhow::Error) -> Self {
        GroupError::Internal(err.to_string())
    }
}

/// 统一的Result类型
pub type GroupResult<T> = std::result::Result<T, GroupError>;

/// 单个成员调用失败的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 目标对象自身返回的业务错误
    Application,
    /// 传输层错误
    Transport,
    /// 调用过程中发生panic
    Panicked,
    /// 成员创建失败
    Creation,
}

/// 单个成员的调用失败
///
/// 失败在执行单元边界被捕获并转换为数据，永远不会让线程池中的worker崩溃。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind:?}: {message}")]
pub struct InvocationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl InvocationFailure {
    pub fn new<S: Into<String>>(kind: FailureKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
    pub fn application<S: Into<String>>(message: S) -> Self {
        Self::new(FailureKind::Application, message)
    }
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::new(FailureKind::Transport, message)
    }
    pub fn panicked<S: Into<String>>(message: S) -> Self {
        Self::new(FailureKind::Panicked, message)
    }
    pub fn creation<S: Into<String>>(message: S) -> Self {
        Self::new(FailureKind::Creation, message)
    }
}

/// 组调用中一个成员的异常记录
#[derive(Debug, Clone)]
pub struct ExceptionRecord {
    pub member_index: usize,
    pub target: Option<TargetRef>,
    pub failure: Arc<InvocationFailure>,
}

/// 聚合失败：整批调用完成后汇总的所有成员失败
///
/// 第一条记录的失败作为共享的根因通过 [`std::error::Error::source`] 暴露。
#[derive(Debug, Clone, Default)]
pub struct AggregateFailure {
    records: Vec<ExceptionRecord>,
}

impl AggregateFailure {
    pub fn new(records: Vec<ExceptionRecord>) -> Self {
        Self { records }
    }
    pub fn records(&self) -> &[ExceptionRecord] {
        &self.records
    }
    pub fn into_records(self) -> Vec<ExceptionRecord> {
        self.records
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn root_cause(&self) -> Option<&InvocationFailure> {
        self.records.first().map(|record| record.failure.as_ref())
    }
    /// 失败成员的下标，按记录顺序
    pub fn member_indices(&self) -> Vec<usize> {
        self.records.iter().map(|record| record.member_index).collect()
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "组调用失败: {} 个成员调用异常", self.records.len())?;
        if let Some(cause) = self.root_cause() {
            write!(f, " (首个异常: {cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.records
            .first()
            .map(|record| record.failure.as_ref() as &(dyn std::error::Error + 'static))
    }
}
