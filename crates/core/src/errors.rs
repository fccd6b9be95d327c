use thiserror::Error;

/// Master协调服务错误类型定义
///
/// 未知Attempt不属于错误：协议层直接回复SHUTDOWN，不会构造错误值。
#[derive(Debug, Error)]
pub enum MasterError {
    #[error("矩阵未找到: {name}")]
    MatrixNotFound { name: String },

    #[error("矩阵已存在: {name}")]
    MatrixAlreadyExists { name: String },

    #[error("无效的矩阵定义: {0}")]
    InvalidMatrixSpec(String),

    #[error("事件投递失败: {0}")]
    EventSink(String),

    #[error("元数据持久化失败: {0}")]
    Persistence(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type MasterResult<T> = std::result::Result<T, MasterError>;

impl MasterError {
    pub fn matrix_not_found<S: Into<String>>(name: S) -> Self {
        Self::MatrixNotFound { name: name.into() }
    }

    pub fn matrix_already_exists<S: Into<String>>(name: S) -> Self {
        Self::MatrixAlreadyExists { name: name.into() }
    }

    pub fn invalid_matrix<S: Into<String>>(msg: S) -> Self {
        Self::InvalidMatrixSpec(msg.into())
    }

    pub fn event_sink<S: Into<String>>(msg: S) -> Self {
        Self::EventSink(msg.into())
    }

    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 元数据查询类错误直接返回给调用方，内部从不重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, MasterError::EventSink(_) | MasterError::Persistence(_))
    }

    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, MasterError::MatrixNotFound { .. })
    }
}

impl From<serde_json::Error> for MasterError {
    fn from(err: serde_json::Error) -> Self {
        MasterError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for MasterError {
    fn from(err: anyhow::Error) -> Self {
        MasterError::Internal(err.to_string())
    }
}
