//! 配置管理
//!
//! 配置来源按优先级从低到高：
//!
//! - 结构体默认值
//! - TOML配置文件（命令行指定，或 `config/psmaster.toml` 等默认位置）
//! - `PSMASTER__` 前缀的环境变量，层级用 `__` 分隔
//!
//! 加载完成后统一调用 `AppConfig::validate`。

pub mod models;

pub use models::*;
