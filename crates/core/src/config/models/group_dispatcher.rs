use serde::{Deserialize, Serialize};

use crate::models::DispatchMode;

fn default_group_name() -> String {
    "default".to_string()
}

fn default_buffer_size() -> usize {
    1
}

fn default_thread_pool_ratio() -> usize {
    4
}

fn default_extra_threads() -> usize {
    3
}

fn default_pool_name() -> String {
    "groupcall".to_string()
}

/// 组级别的通信语义配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default = "default_group_name")]
    pub name: String,
    /// 数组参数是否切分给各成员
    #[serde(default)]
    pub scatter: bool,
    /// 广播参数只序列化一次
    #[serde(default)]
    pub unique_serialization: bool,
    /// 自动移除失败成员而不是抛出聚合失败
    #[serde(default)]
    pub auto_purge: bool,
    #[serde(default)]
    pub dispatch_mode: DispatchMode,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            name: default_group_name(),
            scatter: false,
            unique_serialization: false,
            auto_purge: false,
            dispatch_mode: DispatchMode::Unspecified,
        }
    }
}

impl GroupConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow::anyhow!("组名称不能为空"));
        }
        Ok(())
    }
}

/// 调度器与线程池配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// 溢出前每个成员预先分配的任务数
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// 每多少个成员分配一个线程
    #[serde(default = "default_thread_pool_ratio")]
    pub thread_pool_ratio: usize,
    /// 额外线程数，同时保证空组时线程池仍可工作
    #[serde(default = "default_extra_threads")]
    pub extra_threads: usize,
    #[serde(default = "default_pool_name")]
    pub pool_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            thread_pool_ratio: default_thread_pool_ratio(),
            extra_threads: default_extra_threads(),
            pool_name: default_pool_name(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.thread_pool_ratio == 0 {
            return Err(anyhow::anyhow!("成员与线程比例必须大于0"));
        }

        if self.pool_name.trim().is_empty() {
            return Err(anyhow::anyhow!("线程池名称不能为空"));
        }

        Ok(())
    }

    /// 线程池大小 = ceil(成员数 / 比例) + 额外线程，至少为1
    pub fn pool_size_for(&self, member_count: usize) -> usize {
        let ratio = self.thread_pool_ratio.max(1);
        (member_count.div_ceil(ratio) + self.extra_threads).max(1)
    }
}
