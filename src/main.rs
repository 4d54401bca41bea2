use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use tracing::info;

use groupcall_core::{init_logging, AppConfig, DispatchMode, LogFormat};

mod app;

use app::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("groupcall")
        .version("1.0.0")
        .about("组通信调度引擎演示")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径"),
        )
        .arg(
            Arg::new("members")
                .short('n')
                .long("members")
                .value_name("COUNT")
                .help("模拟成员数量")
                .value_parser(clap::value_parser!(usize))
                .default_value("5"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("分派模式")
                .value_parser([
                    "unspecified",
                    "static_round_robin",
                    "static_random",
                    "dynamic",
                ]),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty", "compact"]),
        )
        .arg(
            Arg::new("fail")
                .long("fail")
                .value_name("INDEX")
                .help("调用总是失败的成员下标，可重复指定")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("auto-purge")
                .long("auto-purge")
                .help("自动移除失败成员")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| format!("加载配置失败: {config_path:?}"))?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.parse::<LogFormat>()?;
    }
    if let Some(mode) = matches.get_one::<String>("mode") {
        config.group.dispatch_mode = mode.parse::<DispatchMode>()?;
    }
    if matches.get_flag("auto-purge") {
        config.group.auto_purge = true;
    }

    // 初始化日志系统
    init_logging(&config.observability.log_level, config.observability.log_format)?;

    let member_count = matches.get_one::<usize>("members").copied().unwrap_or(5);
    let failing: Vec<usize> = matches
        .get_many::<usize>("fail")
        .map(|values| values.copied().collect())
        .unwrap_or_default();

    info!("启动组通信调度引擎演示");
    info!("成员数: {member_count}, 失败成员: {failing:?}");

    let mut app = Application::new(config, member_count, &failing);
    app.run().await?;

    info!("演示结束");
    Ok(())
}
