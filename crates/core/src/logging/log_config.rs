use crate::config::ObservabilityConfig;
use crate::logging::log_level::LogLevel;

/// Output format for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OutputFormat {
    Json,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: OutputFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: OutputFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Build from the `[observability]` section, falling back to defaults for bad values
    pub fn from_observability(config: &ObservabilityConfig) -> Self {
        let mut log_config = Self::default();
        if let Ok(level) = config.log_level.parse::<LogLevel>() {
            log_config.level = level;
        }
        if let Some(format) = Self::parse_format(&config.log_format) {
            log_config.format = format;
        }
        log_config
    }

    /// Override with `LOG_LEVEL` / `LOG_FORMAT` when present
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level_str) = std::env::var("LOG_LEVEL") {
            if let Ok(level) = level_str.parse::<LogLevel>() {
                self.level = level;
            }
        }

        if let Ok(format_str) = std::env::var("LOG_FORMAT") {
            if let Some(format) = Self::parse_format(&format_str) {
                self.format = format;
            }
        }

        self
    }

    pub fn parse_format(format: &str) -> Option<OutputFormat> {
        match format.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "pretty" => Some(OutputFormat::Pretty),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_observability() {
        let observability = ObservabilityConfig {
            log_level: "DEBUG".to_string(),
            log_format: "json".to_string(),
            ..ObservabilityConfig::default()
        };

        let config = LogConfig::from_observability(&observability);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let observability = ObservabilityConfig {
            log_level: "loud".to_string(),
            log_format: "xml".to_string(),
            ..ObservabilityConfig::default()
        };

        assert_eq!(LogConfig::from_observability(&observability), LogConfig::default());
    }
}
