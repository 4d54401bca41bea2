//! 配置管理
//!
//! 配置分为三部分：组通信语义（`group`）、调度器与线程池（`dispatcher`）
//! 以及可观测性（`observability`）。加载顺序为默认值、TOML配置文件、
//! 以 `GROUPCALL_` 为前缀的环境变量。
//!
//! ```toml
//! [group]
//! name = "renderers"
//! scatter = false
//! auto_purge = true
//! dispatch_mode = "dynamic"
//!
//! [dispatcher]
//! buffer_size = 2
//! thread_pool_ratio = 4
//! extra_threads = 3
//! pool_name = "renderers"
//! ```

pub mod models;

#[cfg(test)]
mod config_test;

pub use models::*;
