//! 错误处理模块
//!
//! 定义翻译库中使用的错误类型、错误分类和面向调用方的失败报告。

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// 翻译错误类型
///
/// 后端适配器和分块流水线共用同一个错误类型。
///
/// # 变体说明
///
/// * `Network` - 网络错误（连接失败、超时、5xx、无法解析的响应），可重试
/// * `RateLimited` - 服务商限流，可重试，可能携带 `Retry-After` 提示
/// * `Auth` - API密钥缺失或无效，致命
/// * `UnsupportedLanguage` - 不支持的语言代码，致命
/// * `InvalidInput` - 请求本身无效（例如空文本），致命
/// * `Config` - 配置文件读写或解析失败
/// * `ChunkRetryExhausted` - 某个分块用尽了重试次数，整个请求失败
#[derive(Debug, Error)]
pub enum TranslationError {
    /// 网络错误
    #[error("network error: {0}")]
    Network(String),

    /// 速率限制错误
    #[error("rate limited: {message}")]
    RateLimited {
        /// 错误消息
        message: String,
        /// 服务商建议的等待时间
        retry_after: Option<Duration>,
    },

    /// 认证错误
    #[error("authentication failed: {0}")]
    Auth(String),

    /// 不支持的语言
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// 输入无效
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),

    /// 分块重试耗尽
    #[error("chunk {chunk_index} failed after {attempts} attempts: {cause}")]
    ChunkRetryExhausted {
        /// 失败分块的序号（从0开始）
        chunk_index: usize,
        /// 已尝试次数
        attempts: usize,
        /// 最后一次尝试的瞬时错误
        cause: Box<TranslationError>,
    },
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NetworkError,
    RateLimited,
    AuthError,
    UnsupportedLanguage,
    ChunkRetryExhausted,
    InvalidInput,
    ConfigError,
}

impl TranslationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslationError::Network(_) => ErrorKind::NetworkError,
            TranslationError::RateLimited { .. } => ErrorKind::RateLimited,
            TranslationError::Auth(_) => ErrorKind::AuthError,
            TranslationError::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            TranslationError::InvalidInput(_) => ErrorKind::InvalidInput,
            TranslationError::Config(_) => ErrorKind::ConfigError,
            TranslationError::ChunkRetryExhausted { .. } => ErrorKind::ChunkRetryExhausted,
        }
    }

    /// 检查错误是否可重试
    ///
    /// 只有网络错误和限流错误属于瞬时错误。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranslationError::Network(_) | TranslationError::RateLimited { .. }
        )
    }

    /// 失败分块的序号，仅 `ChunkRetryExhausted` 携带
    pub fn failed_chunk_index(&self) -> Option<usize> {
        match self {
            TranslationError::ChunkRetryExhausted { chunk_index, .. } => Some(*chunk_index),
            _ => None,
        }
    }

    /// 导致重试耗尽的原始瞬时错误类别；其它错误返回自身类别
    pub fn cause_kind(&self) -> ErrorKind {
        match self {
            TranslationError::ChunkRetryExhausted { cause, .. } => cause.kind(),
            other => other.kind(),
        }
    }

    pub(crate) fn network<T: std::fmt::Display>(message: T) -> Self {
        TranslationError::Network(message.to_string())
    }

    pub(crate) fn rate_limited<T: std::fmt::Display>(
        message: T,
        retry_after: Option<Duration>,
    ) -> Self {
        TranslationError::RateLimited {
            message: message.to_string(),
            retry_after,
        }
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::Network(format!("request timed out: {}", error))
        } else if error.is_connect() {
            TranslationError::Network(format!("connection failed: {}", error))
        } else {
            TranslationError::Network(error.to_string())
        }
    }
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::Config(error.to_string())
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Config(format!("invalid settings file: {}", error))
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::Config(format!("failed to serialize settings: {}", error))
    }
}

/// 面向展示层的结构化失败报告
///
/// ```rust
/// use doc_translator::{ErrorKind, FailureReport, TranslationError};
///
/// let error = TranslationError::Auth("missing key".to_string());
/// let report = FailureReport::from(&error);
/// assert_eq!(report.kind, ErrorKind::AuthError);
/// assert_eq!(report.failed_chunk_index, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
    pub failed_chunk_index: Option<usize>,
}

impl From<&TranslationError> for FailureReport {
    fn from(error: &TranslationError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            failed_chunk_index: error.failed_chunk_index(),
        }
    }
}

/// 翻译结果类型别名
///
/// 简化返回类型，使用 `TranslationError` 作为错误类型。
///
/// # 示例
///
/// ```rust
/// use doc_translator::{Result, TranslationError};
///
/// fn example_function() -> Result<String> {
///     Ok("Success".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, TranslationError>;
