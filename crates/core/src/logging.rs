//! 日志初始化与结构化事件
//!
//! 库代码只通过 `tracing` 宏输出；二进制入口调用 [`init_logging`] 安装订阅者。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::InvocationFailure;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(anyhow::anyhow!("不支持的日志格式: {s}")),
        }
    }
}

/// 初始化日志系统
///
/// `RUST_LOG` 环境变量存在时优先于传入的级别。
pub fn init_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
            .context("初始化Compact日志格式失败")?,
    }

    Ok(())
}

/// 组调度相关的结构化日志
pub struct DispatchLogger;

impl DispatchLogger {
    pub fn log_partitioned(group: &str, method: &str, task_count: usize, scatter: bool) {
        debug!(
            event = "call_partitioned",
            group.name = group,
            call.method = method,
            call.task_count = task_count,
            call.scatter = scatter,
            "Call partitioned into member tasks"
        );
    }

    pub fn log_dispatch_start(
        group: &str,
        method: &str,
        task_count: usize,
        member_count: usize,
        pool_size: usize,
        mode: &str,
    ) {
        info!(
            event = "dispatch_start",
            group.name = group,
            call.method = method,
            call.task_count = task_count,
            group.member_count = member_count,
            pool.size = pool_size,
            dispatch.mode = mode,
            "Group dispatch started"
        );
    }

    pub fn log_dispatch_complete(group: &str, method: &str, task_count: usize, duration_ms: u64) {
        info!(
            event = "dispatch_complete",
            group.name = group,
            call.method = method,
            call.task_count = task_count,
            dispatch.duration_ms = duration_ms,
            "Group dispatch completed"
        );
    }

    pub fn log_member_failure(
        group: &str,
        method: &str,
        member_index: usize,
        failure: &InvocationFailure,
    ) {
        warn!(
            event = "member_invocation_failed",
            group.name = group,
            call.method = method,
            member.index = member_index,
            failure.kind = ?failure.kind,
            failure.message = %failure.message,
            "Member invocation failed"
        );
    }

    pub fn log_purge(group: &str, removed: &[usize], remaining: usize) {
        info!(
            event = "group_purged",
            group.name = group,
            purge.removed = ?removed,
            group.remaining = remaining,
            "Failed members purged from group"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
