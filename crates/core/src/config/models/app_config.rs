use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    heartbeat::HeartbeatConfig, master::MasterConfig, observability::ObservabilityConfig,
};

/// 环境变量前缀，例如 `PSMASTER__HEARTBEAT__PS_HEARTBEAT_TIMEOUT_MS=30000`
pub const ENV_PREFIX: &str = "PSMASTER";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub master: MasterConfig,
    pub heartbeat: HeartbeatConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/psmaster.toml", "psmaster.toml", "/etc/psmaster/config.toml"];

            // 找不到配置文件时全部使用结构体默认值
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
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

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.master.validate().context("master配置无效")?;
        self.heartbeat.validate().context("heartbeat配置无效")?;
        self.observability
            .validate()
            .context("observability配置无效")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use std::io::Write;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.master.ps_num, 1);
        assert_eq!(config.heartbeat.ps_heartbeat_timeout_ms, 60_000);
        assert_eq!(config.heartbeat.scan_interval_ms, 1_000);
        assert_eq!(config.observability.log_format, "pretty");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_from_toml_partial() {
        let toml_str = r#"
[master]
ps_num = 4

[heartbeat]
ps_heartbeat_timeout_ms = 1000
client_heartbeat_timeout_ms = 5000
"#;

        let config = AppConfig::from_toml(toml_str).expect("解析失败");
        assert_eq!(config.master.ps_num, 4);
        assert_eq!(config.heartbeat.timeout_ms(Role::Ps), 1000);
        assert_eq!(config.heartbeat.timeout_ms(Role::Client), 5000);
        // 未配置的字段保持默认值
        assert_eq!(config.heartbeat.timeout_ms(Role::Worker), 60_000);
        assert_eq!(config.master.shutdown_timeout_seconds, 30);
    }

    #[test]
    fn test_app_config_validation_rejects_zero_timeout() {
        let toml_str = r#"
[heartbeat]
ps_agent_heartbeat_timeout_ms = 0
"#;
        let err = AppConfig::from_toml(toml_str).unwrap_err();
        assert!(format!("{err:#}").contains("ps_agent"));
    }

    #[test]
    fn test_app_config_validation_rejects_bad_log_format() {
        let mut config = AppConfig::default();
        config.observability.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_toml_roundtrip() {
        let mut config = AppConfig::default();
        config.master.ps_num = 8;
        config.heartbeat.worker_heartbeat_timeout_ms = 12_345;

        let toml_str = config.to_toml().expect("序列化失败");
        let parsed = AppConfig::from_toml(&toml_str).expect("解析失败");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_app_config_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("创建临时文件失败");
        writeln!(
            file,
            "[heartbeat]\nworker_heartbeat_timeout_ms = 2500\nscan_interval_ms = 200"
        )
        .expect("写入临时文件失败");

        let path = file.path().to_str().expect("路径无效");
        let config = AppConfig::load(Some(path)).expect("加载失败");
        assert_eq!(config.heartbeat.worker_heartbeat_timeout_ms, 2500);
        assert_eq!(config.heartbeat.scan_interval_ms, 200);
    }

    #[test]
    fn test_app_config_load_missing_file() {
        let result = AppConfig::load(Some("/definitely/not/here/psmaster.toml"));
        assert!(result.is_err());
    }
}
