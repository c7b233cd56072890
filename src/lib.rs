//! # Doc Translator
//!
//! 一个面向长文档的Rust翻译库：把任意长度的纯文本切成后端可接受的分块，
//! 通过可插拔的翻译后端逐块翻译，并在网络不稳定时自动重试。
//!
//! ## 主要特性
//!
//! - **可插拔后端**: 免费 Google 网页接口、DeepLX 兼容的聚合服务、DeepL 付费 API
//! - **智能分块**: 优先在段落、换行、句末处切分，切分无损，保留原文分隔符
//! - **重试与退避**: 网络错误和限流按分块指数退避重试，致命错误立即中止
//! - **并行翻译**: 可选的固定大小工作池，结果始终按原文顺序拼接
//! - **速率限制**: 内置请求速率限制器，防止触发服务商限流
//! - **配置灵活**: 支持TOML设置文件和环境变量覆盖
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use doc_translator::{Settings, TranslationPipeline, TranslationRequest, BackendKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load_from_default_locations();
//!     let pipeline = TranslationPipeline::from_settings(&settings)?;
//!
//!     let request = TranslationRequest::new("Hello, world!", "fr", settings.backend.kind);
//!     let result = pipeline.translate(&request).await?;
//!     println!("Translation: {}", result);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## 错误处理
//!
//! 瞬时错误只在重试耗尽后以 `ChunkRetryExhausted` 的形式返回，并带上失败分块的序号：
//!
//! ```rust
//! use doc_translator::{FailureReport, TranslationError};
//!
//! fn describe(error: &TranslationError) -> String {
//!     let report = FailureReport::from(error);
//!     match report.failed_chunk_index {
//!         Some(index) => format!("{:?} at chunk {}: {}", report.kind, index, report.message),
//!         None => format!("{:?}: {}", report.kind, report.message),
//!     }
//! }
//! ```

pub mod backend;
pub mod chunker;
pub mod config;
pub mod error;
pub mod language;
pub mod pipeline;
pub mod retry;
pub mod types;

pub use backend::{
    create_translator, AggregatorTranslator, DeepLTranslator, FreeScrapeTranslator, Translator,
};
pub use chunker::Chunker;
pub use config::Settings;
pub use error::{ErrorKind, FailureReport, Result, TranslationError};
pub use pipeline::{translate_request, TranslationPipeline};
pub use retry::{retry_with_backoff, BackoffPolicy, RateLimiter, RetryError};
pub use types::{
    ApiKey, BackendConfig, BackendKind, Chunk, PipelineConfig, Progress, RetryConfig,
    TranslationRequest,
};
