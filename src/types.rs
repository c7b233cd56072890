//! 类型定义模块
//!
//! 定义翻译库中使用的所有数据结构和配置类型。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 翻译后端
///
/// 配置文件中使用 `free_scrape` / `aggregator` / `paid_api`，
/// 同时兼容旧设置里的 `googletrans` / `deep-translator` / `deepl`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// 免费的 Google 网页接口，无需密钥
    #[default]
    #[serde(alias = "googletrans")]
    FreeScrape,
    /// DeepLX 兼容的翻译聚合服务
    #[serde(alias = "deep-translator")]
    Aggregator,
    /// DeepL 付费 API，需要密钥
    #[serde(alias = "deepl")]
    PaidApi,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::FreeScrape => "free_scrape",
            BackendKind::Aggregator => "aggregator",
            BackendKind::PaidApi => "paid_api",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = crate::error::TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free_scrape" | "googletrans" => Ok(BackendKind::FreeScrape),
            "aggregator" | "deep-translator" => Ok(BackendKind::Aggregator),
            "paid_api" | "deepl" => Ok(BackendKind::PaidApi),
            other => Err(crate::error::TranslationError::Config(format!(
                "unknown translation backend: {}",
                other
            ))),
        }
    }
}

/// API 密钥
///
/// `Debug` 输出中不会出现密钥本身。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// 翻译请求
///
/// 一次翻译调用的全部输入。流水线在发出任何网络请求之前校验：
/// 文本不能为空，目标语言必须受支持。
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    /// 原文
    pub source_text: String,
    /// 源语言代码，"auto"表示自动检测
    pub source_lang: String,
    /// 目标语言代码
    pub target_lang: String,
    /// 使用的翻译后端
    pub backend: BackendKind,
    /// 付费后端的API密钥
    pub api_key: Option<ApiKey>,
}

impl TranslationRequest {
    pub fn new<T, L>(source_text: T, target_lang: L, backend: BackendKind) -> Self
    where
        T: Into<String>,
        L: Into<String>,
    {
        Self {
            source_text: source_text.into(),
            source_lang: "auto".to_string(),
            target_lang: target_lang.into(),
            backend,
            api_key: None,
        }
    }

    pub fn with_source_lang<L: Into<String>>(mut self, source_lang: L) -> Self {
        self.source_lang = source_lang.into();
        self
    }

    pub fn with_api_key(mut self, api_key: ApiKey) -> Self {
        self.api_key = Some(api_key);
        self
    }
}

/// 文本分块
///
/// 原文的一段连续子串。所有分块按 `index` 顺序拼接即得到原文。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

impl Chunk {
    /// 开头的空白
    pub fn leading(&self) -> &str {
        let body_start = self.text.len() - self.text.trim_start().len();
        &self.text[..body_start]
    }

    /// 去掉首尾空白后需要翻译的部分
    pub fn body(&self) -> &str {
        self.text.trim()
    }

    /// 结尾的空白（分块时使用的分隔符落在这里）
    pub fn trailing(&self) -> &str {
        let trimmed = self.text.trim_end();
        if trimmed.is_empty() {
            // 纯空白分块整体算作 leading
            return "";
        }
        &self.text[trimmed.len()..]
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// 后端配置
///
/// 由设置文件持有，对流水线只读。
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// 当前选择的后端
    pub kind: BackendKind,
    /// DeepL API密钥
    pub api_key: Option<ApiKey>,
    /// 聚合服务地址（DeepLX 兼容接口）
    pub aggregator_url: String,
    /// 覆盖后端默认的单块最大字符数
    pub max_chunk_chars: Option<usize>,
    /// HTTP 请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::FreeScrape,
            api_key: None,
            aggregator_url: "http://localhost:1188/translate".to_string(),
            max_chunk_chars: None,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("aggregator_url", &self.aggregator_url)
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// 重试配置
///
/// 第 n 次重试前的等待时间为 `initial_delay_ms * backoff_multiplier^(n-1)`，
/// 不超过 `max_delay_ms`。限流错误再乘以 `rate_limit_multiplier`。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 每个分块的最大尝试次数（含第一次）
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub rate_limit_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 2000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            rate_limit_multiplier: 2.0,
        }
    }
}

/// 流水线配置
///
/// # 字段说明
///
/// * `max_concurrent_chunks` - 同时翻译的分块数，1 表示顺序翻译
/// * `max_requests_per_second` - 每秒最大请求数，0 表示不限制
/// * `lookback_ratio` - 寻找分块边界时回看窗口占单块上限的比例
/// * `retry` - 分块级别的重试策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_concurrent_chunks: usize,
    pub max_requests_per_second: f64,
    pub lookback_ratio: f64,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_chunks: 1,
            max_requests_per_second: 2.0,
            lookback_ratio: 0.5,
            retry: RetryConfig::default(),
        }
    }
}

/// 流水线进度事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// 开始翻译，共 `total_chunks` 块
    Started { total_chunks: usize },
    ChunkStarted { chunk_index: usize, total_chunks: usize },
    /// 第 `attempt` 次尝试失败，将在 `delay_ms` 毫秒后重试
    Retrying {
        chunk_index: usize,
        attempt: usize,
        delay_ms: u64,
    },
    ChunkFinished { completed: usize, total_chunks: usize },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeepLXRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

#[derive(Debug, Deserialize)]
pub struct DeepLXResponse {
    pub code: i32,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct DeepLResponse {
    pub translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
pub struct DeepLTranslation {
    pub text: String,
    #[serde(default)]
    pub detected_source_language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_splits_surrounding_whitespace() {
        let chunk = Chunk {
            index: 0,
            text: "\n  Hello there.\n\n".to_string(),
        };
        assert_eq!(chunk.leading(), "\n  ");
        assert_eq!(chunk.body(), "Hello there.");
        assert_eq!(chunk.trailing(), "\n\n");
        assert_eq!(
            format!("{}{}{}", chunk.leading(), chunk.body(), chunk.trailing()),
            chunk.text
        );
    }

    #[test]
    fn whitespace_only_chunk_is_all_leading() {
        let chunk = Chunk {
            index: 3,
            text: " \n ".to_string(),
        };
        assert_eq!(chunk.leading(), " \n ");
        assert_eq!(chunk.body(), "");
        assert_eq!(chunk.trailing(), "");
    }

    #[test]
    fn backend_kind_accepts_legacy_names() {
        assert_eq!("googletrans".parse::<BackendKind>().unwrap(), BackendKind::FreeScrape);
        assert_eq!("deep-translator".parse::<BackendKind>().unwrap(), BackendKind::Aggregator);
        assert_eq!("DeepL".parse::<BackendKind>().unwrap(), BackendKind::PaidApi);
        assert!("babelfish".parse::<BackendKind>().is_err());
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let config = BackendConfig {
            kind: BackendKind::PaidApi,
            api_key: Some(ApiKey::new("secret-123:fx")),
            ..BackendConfig::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-123"));
        assert!(format!("{:?}", ApiKey::new("secret-123")).contains("***"));
    }

    #[test]
    fn request_defaults_to_auto_source() {
        let request = TranslationRequest::new("Hello", "fr", BackendKind::FreeScrape);
        assert_eq!(request.source_lang, "auto");
        assert!(request.api_key.is_none());
    }
}
