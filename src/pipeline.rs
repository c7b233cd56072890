//! 分块翻译流水线
//!
//! 把任意长度的文本切成后端可接受的分块，逐块调用翻译后端，
//! 对瞬时错误按分块重试，最后按原始顺序拼接译文。
//!
//! 请求是全有或全无的：任何一个分块失败，整个请求失败，已完成的部分译文被丢弃。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::backend::{create_translator, Translator};
use crate::chunker::Chunker;
use crate::config::Settings;
use crate::error::{Result, TranslationError};
use crate::language;
use crate::retry::{retry_with_backoff, BackoffPolicy, RateLimiter};
use crate::types::{Chunk, PipelineConfig, Progress, TranslationRequest};

/// 分块翻译流水线
///
/// # 示例
///
/// ```rust,no_run
/// use doc_translator::{
///     create_translator, BackendConfig, BackendKind, PipelineConfig, TranslationPipeline,
///     TranslationRequest,
/// };
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let translator = create_translator(&BackendConfig::default())?;
///     let pipeline = TranslationPipeline::new(translator, PipelineConfig::default());
///
///     let request = TranslationRequest::new("Hello world", "fr", BackendKind::FreeScrape);
///     let translated = pipeline.translate(&request).await?;
///     println!("{}", translated);
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TranslationPipeline {
    translator: Arc<dyn Translator>,
    policy: BackoffPolicy,
    rate_limiter: RateLimiter,
    max_concurrent_chunks: usize,
    lookback_ratio: f64,
    progress: Option<UnboundedSender<Progress>>,
}

impl TranslationPipeline {
    pub fn new(translator: Arc<dyn Translator>, config: PipelineConfig) -> Self {
        Self {
            translator,
            policy: BackoffPolicy::new(&config.retry),
            rate_limiter: RateLimiter::new(config.max_requests_per_second),
            max_concurrent_chunks: config.max_concurrent_chunks.max(1),
            lookback_ratio: config.lookback_ratio,
            progress: None,
        }
    }

    /// 按设置文件创建流水线
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let translator = create_translator(&settings.backend)?;
        Ok(Self::new(translator, settings.pipeline.clone()))
    }

    /// 接收进度事件
    pub fn with_progress(mut self, sender: UnboundedSender<Progress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn translator(&self) -> &Arc<dyn Translator> {
        &self.translator
    }

    /// 按当前后端的长度限制切分文本
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        Chunker::with_lookback_ratio(self.translator.max_chunk_chars(), self.lookback_ratio)
            .split(text)
    }

    /// 翻译一个请求
    ///
    /// `request.backend` 必须与流水线的后端一致，否则返回配置错误；
    /// 需要按请求选择后端时使用 [`translate_request`]。
    /// 请求携带的 API 密钥优先于后端创建时的密钥。
    pub async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        if request.backend.as_str() != self.translator.name() {
            return Err(TranslationError::Config(format!(
                "request asks for backend {} but the pipeline uses {}",
                request.backend,
                self.translator.name()
            )));
        }

        let rekeyed = request
            .api_key
            .as_ref()
            .and_then(|key| self.translator.with_api_key(key))
            .map(|translator| {
                debug!("使用请求携带的 API 密钥");
                Self {
                    translator,
                    ..self.clone()
                }
            });
        let pipeline = rekeyed.as_ref().unwrap_or(self);

        pipeline
            .translate_text(&request.source_text, &request.source_lang, &request.target_lang)
            .await
    }

    /// 翻译文本
    ///
    /// # 返回
    ///
    /// * `Ok(String)` - 按原始顺序拼接的完整译文
    /// * `Err(TranslationError)` - 输入无效、致命错误，或某个分块重试耗尽
    pub async fn translate_text(
        &self,
        source_text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        if source_text.trim().is_empty() {
            return Err(TranslationError::InvalidInput(
                "source text is empty".to_string(),
            ));
        }
        language::validate_source(source_lang)?;
        language::validate_target(target_lang)?;

        let chunks = self.chunk(source_text);
        let total = chunks.len();

        info!(
            "使用 {} 翻译 {} 字符，分为 {} 块",
            self.translator.name(),
            source_text.chars().count(),
            total
        );

        let dispatcher = Arc::new(Dispatcher {
            translator: self.translator.clone(),
            policy: self.policy.clone(),
            rate_limiter: self.rate_limiter.clone(),
            progress: self.progress.clone(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            total,
            completed: AtomicUsize::new(0),
        });
        dispatcher.emit(Progress::Started { total_chunks: total });

        let translated = if self.max_concurrent_chunks == 1 || total == 1 {
            translate_sequentially(&dispatcher, &chunks).await?
        } else {
            translate_in_parallel(dispatcher, chunks, self.max_concurrent_chunks).await?
        };

        Ok(translated.concat())
    }
}

/// 按请求中的后端和密钥翻译
///
/// 后端的其它参数（聚合服务地址、超时等）以及流水线参数取自 `settings`。
pub async fn translate_request(
    request: &TranslationRequest,
    settings: &Settings,
) -> Result<String> {
    let mut backend = settings.backend.clone();
    backend.kind = request.backend;
    if request.api_key.is_some() {
        backend.api_key = request.api_key.clone();
    }

    let translator = create_translator(&backend)?;
    let pipeline = TranslationPipeline::new(translator, settings.pipeline.clone());
    pipeline.translate(request).await
}

/// 单个请求内所有分块共享的只读上下文
struct Dispatcher {
    translator: Arc<dyn Translator>,
    policy: BackoffPolicy,
    rate_limiter: RateLimiter,
    progress: Option<UnboundedSender<Progress>>,
    source_lang: String,
    target_lang: String,
    total: usize,
    completed: AtomicUsize,
}

impl Dispatcher {
    fn emit(&self, event: Progress) {
        if let Some(sender) = &self.progress {
            // 接收端已关闭时忽略
            let _ = sender.send(event);
        }
    }

    /// 翻译一个分块，保留分块首尾的空白
    async fn translate_chunk(&self, chunk: &Chunk) -> Result<String> {
        let body = chunk.body();
        self.emit(Progress::ChunkStarted {
            chunk_index: chunk.index,
            total_chunks: self.total,
        });

        let translated = if body.is_empty() {
            String::new()
        } else {
            debug!("开始翻译第 {} 块，长度: {} 字符", chunk.index + 1, chunk.char_len());
            retry_with_backoff(
                || {
                    self.translator
                        .translate(body, &self.source_lang, &self.target_lang)
                },
                &self.policy,
                &self.rate_limiter,
                |attempt, delay, _| {
                    self.emit(Progress::Retrying {
                        chunk_index: chunk.index,
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    })
                },
            )
            .await
            .map_err(|e| e.into_chunk_error(chunk.index))?
        };

        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("完成翻译第 {} 块 ({}/{})", chunk.index + 1, completed, self.total);
        self.emit(Progress::ChunkFinished {
            completed,
            total_chunks: self.total,
        });

        Ok(format!("{}{}{}", chunk.leading(), translated.trim(), chunk.trailing()))
    }
}

async fn translate_sequentially(dispatcher: &Dispatcher, chunks: &[Chunk]) -> Result<Vec<String>> {
    let mut translated = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        translated.push(dispatcher.translate_chunk(chunk).await?);
    }
    Ok(translated)
}

/// 固定大小的工作池：每个工作任务按序号领取下一个分块
///
/// 结果按分块序号存放，与完成顺序无关。任何分块失败后设置中止标志，
/// 其它工作任务不再领取新分块，仍在进行的任务随 `JoinSet` 一起中止。
async fn translate_in_parallel(
    dispatcher: Arc<Dispatcher>,
    chunks: Vec<Chunk>,
    max_workers: usize,
) -> Result<Vec<String>> {
    let total = chunks.len();
    let chunks = Arc::new(chunks);
    let next = Arc::new(AtomicUsize::new(0));
    let aborted = Arc::new(AtomicBool::new(false));

    let mut workers = JoinSet::new();
    for _ in 0..max_workers.min(total) {
        let dispatcher = dispatcher.clone();
        let chunks = chunks.clone();
        let next = next.clone();
        let aborted = aborted.clone();

        workers.spawn(async move {
            let mut done = Vec::new();
            while !aborted.load(Ordering::SeqCst) {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(chunk) = chunks.get(index) else {
                    break;
                };
                match dispatcher.translate_chunk(chunk).await {
                    Ok(text) => done.push((index, text)),
                    Err(e) => {
                        aborted.store(true, Ordering::SeqCst);
                        return Err(e);
                    }
                }
            }
            Ok(done)
        });
    }

    let mut results: Vec<Option<String>> = vec![None; total];

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(done)) => {
                for (index, text) in done {
                    results[index] = Some(text);
                }
            }
            Ok(Err(e)) => {
                workers.abort_all();
                return Err(e);
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {}
        }
    }

    results
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            text.ok_or_else(|| {
                TranslationError::network(format!("chunk {} produced no translation", index))
            })
        })
        .collect()
}
