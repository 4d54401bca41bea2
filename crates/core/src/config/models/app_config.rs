use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    group_dispatcher::{DispatcherConfig, GroupConfig},
    observability::ObservabilityConfig,
};

/// 组调度引擎配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: GROUPCALL_, nested keys separated by `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("group.name", defaults.group.name.clone())?
            .set_default("group.scatter", defaults.group.scatter)?
            .set_default(
                "group.unique_serialization",
                defaults.group.unique_serialization,
            )?
            .set_default("group.auto_purge", defaults.group.auto_purge)?
            .set_default("group.dispatch_mode", defaults.group.dispatch_mode.as_str())?
            .set_default("dispatcher.buffer_size", defaults.dispatcher.buffer_size as u64)?
            .set_default(
                "dispatcher.thread_pool_ratio",
                defaults.dispatcher.thread_pool_ratio as u64,
            )?
            .set_default(
                "dispatcher.extra_threads",
                defaults.dispatcher.extra_threads as u64,
            )?
            .set_default("dispatcher.pool_name", defaults.dispatcher.pool_name.clone())?
            .set_default("observability.log_level", defaults.observability.log_level.clone())?
            .set_default(
                "observability.log_format",
                defaults.observability.log_format.as_str(),
            )?
            .set_default(
                "observability.metrics_enabled",
                defaults.observability.metrics_enabled,
            )?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/groupcall.toml", "groupcall.toml"];
            if let Some(path) = default_paths.iter().find(|path| Path::new(path).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("GROUPCALL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.group.validate().context("组配置验证失败")?;

        self.dispatcher
            .validate()
            .context("调度器配置验证失败")?;

        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}
