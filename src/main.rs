use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use metrics_exporter_prometheus::PrometheusBuilder;
use psmaster::{Application, ShutdownManager};
use psmaster_core::{AppConfig, LogConfig, LogLevel, OutputFormat};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 应用异常退出时使用的退出码
const INTERNAL_ERROR_EXIT_STATUS: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("psmaster")
        .version("1.0.0")
        .about("参数服务器训练系统的Master协调服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，不指定时依次查找默认位置"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");

    // 加载配置
    let config = AppConfig::load(config_path.map(String::as_str)).with_context(|| {
        format!(
            "加载配置失败: {}",
            config_path.map(String::as_str).unwrap_or("<默认路径>")
        )
    })?;

    // 初始化日志系统：配置文件 < 环境变量 < 命令行
    let mut log_config = LogConfig::from_observability(&config.observability).with_env_overrides();
    if let Some(level) = matches.get_one::<String>("log-level") {
        log_config.level = level.parse::<LogLevel>()?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        log_config.format = LogConfig::parse_format(format)
            .ok_or_else(|| anyhow::anyhow!("不支持的日志格式: {format}"))?;
    }
    init_logging(&log_config)?;

    info!("启动PS Master");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    if config.observability.metrics_enabled {
        init_metrics(&config.observability.metrics_bind_address)?;
    }

    let shutdown_timeout = Duration::from_secs(config.master.shutdown_timeout_seconds);

    // 创建应用实例
    let app = Application::new(config)?;

    // 创建优雅关闭管理器
    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    let mut app_handle = tokio::spawn(app.run(shutdown_rx));

    let exit_status = tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;

            match tokio::time::timeout(shutdown_timeout, &mut app_handle).await {
                Ok(result) => exit_status_of(result),
                Err(_) => {
                    warn!("应用关闭超时，强制退出");
                    app_handle.abort();
                    INTERNAL_ERROR_EXIT_STATUS
                }
            }
        }
        result = &mut app_handle => exit_status_of(result),
    };

    info!("PS Master已退出 (退出码: {exit_status})");
    std::process::exit(exit_status);
}

fn exit_status_of(result: Result<Result<i32>, tokio::task::JoinError>) -> i32 {
    match result {
        Ok(Ok(exit_status)) => exit_status,
        Ok(Err(e)) => {
            error!("应用运行失败: {e:#}");
            INTERNAL_ERROR_EXIT_STATUS
        }
        Err(e) => {
            error!("应用任务异常退出: {e}");
            INTERNAL_ERROR_EXIT_STATUS
        }
    }
}

/// 初始化日志系统
fn init_logging(log_config: &LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_config.level.as_directive()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_config.format {
        OutputFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        OutputFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
    }

    Ok(())
}

/// 安装Prometheus指标导出器
fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {bind_address}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus导出器失败: {e}"))?;

    metrics::describe_counter!(
        "psmaster_heartbeat_timeouts_total",
        "心跳超时被剔除的参与方数量"
    );
    metrics::describe_counter!(
        "psmaster_unknown_attempt_total",
        "被要求退出的未知Attempt请求数量"
    );
    metrics::describe_counter!("psmaster_commit_issued_total", "下发的COMMIT指令数量");
    metrics::describe_gauge!("psmaster_live_attempts", "各类参与方当前存活数量");

    info!("Prometheus指标导出器已启动: {addr}");
    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
