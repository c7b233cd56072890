//! 翻译后端适配器
//!
//! 把三种调用方式、错误类型各不相同的翻译服务统一成一个 [`Translator`] 接口：
//!
//! - [`FreeScrapeTranslator`] - 免费的 Google 网页接口
//! - [`AggregatorTranslator`] - DeepLX 兼容的翻译聚合服务
//! - [`DeepLTranslator`] - DeepL 付费 API
//!
//! 每次调用都是无状态的，适配器负责把 HTTP 状态码和服务商的错误归类为
//! 网络错误、限流、认证失败或不支持的语言。

mod aggregator;
mod deepl;
mod google;

pub use aggregator::AggregatorTranslator;
pub use deepl::DeepLTranslator;
pub use google::FreeScrapeTranslator;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{Result, TranslationError};
use crate::types::{ApiKey, BackendConfig, BackendKind};

/// 翻译后端接口
#[async_trait]
pub trait Translator: Send + Sync {
    /// 后端名称，用于日志
    fn name(&self) -> &'static str;

    /// 单次调用允许的最大字符数
    fn max_chunk_chars(&self) -> usize;

    /// 翻译一段不超过 `max_chunk_chars` 的文本
    ///
    /// `source_lang` 可以是 `"auto"`。
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String>;

    /// 换用另一个密钥的同一后端
    ///
    /// 不使用密钥的后端返回 `None`。
    fn with_api_key(&self, _api_key: &ApiKey) -> Option<Arc<dyn Translator>> {
        None
    }
}

/// 按配置创建翻译后端
///
/// ```rust
/// use doc_translator::{create_translator, BackendConfig, BackendKind, Translator};
///
/// let config = BackendConfig {
///     kind: BackendKind::Aggregator,
///     ..BackendConfig::default()
/// };
/// let translator = create_translator(&config).unwrap();
/// assert_eq!(translator.name(), "aggregator");
/// assert_eq!(translator.max_chunk_chars(), 3000);
/// ```
pub fn create_translator(config: &BackendConfig) -> Result<Arc<dyn Translator>> {
    let client = build_client(Duration::from_secs(config.timeout_secs.max(1)));

    debug!("创建翻译后端: {}", config.kind);

    let translator: Arc<dyn Translator> = match config.kind {
        BackendKind::FreeScrape => {
            let mut translator = FreeScrapeTranslator::new(client);
            if let Some(max) = config.max_chunk_chars {
                translator = translator.with_max_chunk_chars(max);
            }
            Arc::new(translator)
        }
        BackendKind::Aggregator => {
            if config.aggregator_url.trim().is_empty() {
                return Err(TranslationError::Config(
                    "aggregator backend requires aggregator_url".to_string(),
                ));
            }
            let mut translator = AggregatorTranslator::new(client, config.aggregator_url.clone());
            if let Some(max) = config.max_chunk_chars {
                translator = translator.with_max_chunk_chars(max);
            }
            Arc::new(translator)
        }
        BackendKind::PaidApi => {
            let mut translator = DeepLTranslator::new(client, config.api_key.clone());
            if let Some(max) = config.max_chunk_chars {
                translator = translator.with_max_chunk_chars(max);
            }
            Arc::new(translator)
        }
    };

    Ok(translator)
}

/// 创建共享的 HTTP 客户端
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(5)
        .tcp_keepalive(Duration::from_secs(60))
        .user_agent("Mozilla/5.0 (compatible; DocTranslator/1.0)")
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to create optimized client: {}, using default", e);
            Client::new()
        })
}

/// 解析 `Retry-After`（秒）
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// 错误正文是否在抱怨语言参数（HTML 错误页不算）
fn mentions_language(body: &str) -> bool {
    let body = body.trim_start();
    if body.starts_with('<') {
        return false;
    }
    let body = body.to_ascii_lowercase();
    ["target_lang", "source_lang", "language"]
        .iter()
        .any(|needle| body.contains(needle))
}

/// 把失败的 HTTP 响应归类为翻译错误
pub(crate) fn classify_status(
    backend: &str,
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> TranslationError {
    let message = format!("{} returned {}: {}", backend, status, body.trim());

    match status.as_u16() {
        401 | 403 => TranslationError::Auth(message),
        // 456: DeepL 配额用尽
        429 | 456 => TranslationError::rate_limited(message, retry_after),
        400 if mentions_language(body) => TranslationError::UnsupportedLanguage(message),
        400 | 413 | 414 => TranslationError::InvalidInput(message),
        404 => TranslationError::Config(message),
        _ => TranslationError::network(message),
    }
}
