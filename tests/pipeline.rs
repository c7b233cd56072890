use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use doc_translator::{
    ApiKey, BackendKind, ErrorKind, FailureReport, PipelineConfig, Progress, Result, RetryConfig,
    TranslationError, TranslationPipeline, TranslationRequest, Translator,
};
use tokio_test::{assert_err, assert_ok};

type Respond = dyn Fn(&str, usize) -> Result<String> + Send + Sync;
type Delay = dyn Fn(&str) -> Duration + Send + Sync;

/// 按脚本应答的假后端，记录每段文本被调用的次数和调用顺序
struct Scripted {
    max_chunk_chars: usize,
    respond: Box<Respond>,
    delay: Box<Delay>,
    attempts: Mutex<HashMap<String, usize>>,
    log: Mutex<Vec<String>>,
}

impl Scripted {
    fn new<F>(max_chunk_chars: usize, respond: F) -> Self
    where
        F: Fn(&str, usize) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            max_chunk_chars,
            respond: Box::new(respond),
            delay: Box::new(|_| Duration::ZERO),
            attempts: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.delay = Box::new(delay);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn attempts_for(&self, text: &str) -> usize {
        self.attempts.lock().unwrap().get(text).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Translator for Scripted {
    fn name(&self) -> &'static str {
        "free_scrape"
    }

    fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(text.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.log.lock().unwrap().push(text.to_string());

        let delay = (self.delay)(text);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        (self.respond)(text, attempt)
    }
}

/// 需要密钥的假后端，译文带上所用的密钥
struct Keyed {
    key: Option<ApiKey>,
}

#[async_trait]
impl Translator for Keyed {
    fn name(&self) -> &'static str {
        "paid_api"
    }

    fn max_chunk_chars(&self) -> usize {
        5000
    }

    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        match &self.key {
            Some(key) => Ok(format!("{}:{}", key.expose(), text)),
            None => Err(TranslationError::Auth("missing key".to_string())),
        }
    }

    fn with_api_key(&self, api_key: &ApiKey) -> Option<Arc<dyn Translator>> {
        Some(Arc::new(Keyed {
            key: Some(api_key.clone()),
        }))
    }
}

fn config(max_concurrent_chunks: usize) -> PipelineConfig {
    PipelineConfig {
        max_concurrent_chunks,
        max_requests_per_second: 0.0,
        lookback_ratio: 0.5,
        retry: RetryConfig::default(),
    }
}

fn pipeline(translator: &Arc<Scripted>, max_concurrent_chunks: usize) -> TranslationPipeline {
    TranslationPipeline::new(translator.clone(), config(max_concurrent_chunks))
}

fn bracket(text: &str) -> Result<String> {
    Ok(format!("[{}]", text))
}

/// 五个段落，每段约 30 个字符，单块上限 40 时每段单独成块
fn five_paragraphs() -> String {
    (0..5)
        .map(|i| format!("Paragraph number {} has text.", i))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[tokio::test(start_paused = true)]
async fn short_text_is_translated_in_one_call() {
    let translator = Arc::new(Scripted::new(5000, |text, _| {
        assert_eq!(text, "Hello world");
        Ok("Bonjour le monde".to_string())
    }));
    let pipeline = pipeline(&translator, 1);

    let chunks = pipeline.chunk("Hello world");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Hello world");

    let request = TranslationRequest::new("Hello world", "fr", BackendKind::FreeScrape);
    let translated = assert_ok!(pipeline.translate(&request).await);

    assert_eq!(translated, "Bonjour le monde");
    assert_eq!(translator.calls(), vec!["Hello world".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn long_text_chunks_reassemble_exactly() {
    let translator = Arc::new(Scripted::new(40, |text, _| bracket(text)));
    let pipeline = pipeline(&translator, 1);
    let text = five_paragraphs();

    let chunks = pipeline.chunk(&text);
    assert_eq!(chunks.len(), 5);
    assert_eq!(chunks.iter().map(|c| c.text.as_str()).collect::<String>(), text);
    assert!(chunks.iter().all(|c| c.char_len() <= 40));

    let translated = pipeline.translate_text(&text, "en", "de").await.unwrap();
    let expected = (0..5)
        .map(|i| format!("[Paragraph number {} has text.]", i))
        .collect::<Vec<_>>()
        .join("\n\n");
    assert_eq!(translated, expected);
}

#[tokio::test(start_paused = true)]
async fn parallel_results_follow_chunk_order_not_completion_order() {
    // 越靠前的分块完成得越晚
    let translator = Arc::new(Scripted::new(40, |text, _| bracket(text)).with_delay(|text| {
        let n: u64 = text
            .chars()
            .find(|c| c.is_ascii_digit())
            .and_then(|c| c.to_digit(10))
            .map(u64::from)
            .unwrap_or(0);
        Duration::from_millis(500 - n * 100)
    }));
    let text = five_paragraphs();

    let sequential = pipeline(&Arc::new(Scripted::new(40, |text, _| bracket(text))), 1)
        .translate_text(&text, "auto", "ja")
        .await
        .unwrap();
    let parallel = pipeline(&translator, 5)
        .translate_text(&text, "auto", "ja")
        .await
        .unwrap();

    assert_eq!(parallel, sequential);
    assert_eq!(translator.calls().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn network_errors_within_budget_are_retried() {
    let translator = Arc::new(Scripted::new(5000, |text, attempt| {
        if attempt <= 2 {
            Err(TranslationError::Network(format!("connection reset ({})", attempt)))
        } else {
            Ok(text.to_uppercase())
        }
    }));

    let translated = pipeline(&translator, 1)
        .translate_text("hello", "auto", "en")
        .await
        .unwrap();

    assert_eq!(translated, "HELLO");
    assert_eq!(translator.attempts_for("hello"), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_identify_the_failing_chunk() {
    let translator = Arc::new(Scripted::new(40, |text, _| {
        if text.contains('2') {
            Err(TranslationError::Network("timeout".to_string()))
        } else {
            bracket(text)
        }
    }));
    let text = five_paragraphs();

    let err = assert_err!(pipeline(&translator, 1).translate_text(&text, "auto", "fr").await);

    assert_eq!(err.kind(), ErrorKind::ChunkRetryExhausted);
    assert_eq!(err.cause_kind(), ErrorKind::NetworkError);
    assert_eq!(err.failed_chunk_index(), Some(2));
    assert_eq!(translator.attempts_for("Paragraph number 2 has text."), 3);

    // 前面的分块只翻译一次，后面的分块不再尝试
    assert_eq!(translator.attempts_for("Paragraph number 0 has text."), 1);
    assert_eq!(translator.attempts_for("Paragraph number 1 has text."), 1);
    assert_eq!(translator.attempts_for("Paragraph number 3 has text."), 0);

    let report = FailureReport::from(&err);
    assert_eq!(report.failed_chunk_index, Some(2));
}

#[tokio::test(start_paused = true)]
async fn auth_error_aborts_without_retrying_or_continuing() {
    let translator = Arc::new(Scripted::new(40, |_, _| {
        Err(TranslationError::Auth("invalid API key".to_string()))
    }));
    let text = five_paragraphs();

    let err = pipeline(&translator, 1)
        .translate_text(&text, "auto", "fr")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthError);
    assert_eq!(err.failed_chunk_index(), None);
    assert_eq!(translator.calls(), vec!["Paragraph number 0 has text.".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unsupported_language_from_backend_is_fatal() {
    let translator = Arc::new(Scripted::new(40, |text, _| {
        if text.contains('1') {
            Err(TranslationError::UnsupportedLanguage("target 'tlh'".to_string()))
        } else {
            bracket(text)
        }
    }));
    let text = five_paragraphs();

    let err = pipeline(&translator, 1)
        .translate_text(&text, "auto", "fr")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
    assert_eq!(translator.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_in_parallel_mode_stops_remaining_chunks() {
    let translator = Arc::new(Scripted::new(40, |text, _| {
        if text.contains('0') {
            Err(TranslationError::Auth("revoked".to_string()))
        } else {
            bracket(text)
        }
    }).with_delay(|text| {
        // 分块0很快失败，分块1仍在进行中
        if text.contains('0') {
            Duration::from_millis(10)
        } else {
            Duration::from_secs(5)
        }
    }));
    let text = five_paragraphs();

    let err = pipeline(&translator, 2)
        .translate_text(&text, "auto", "fr")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthError);
    // 只有两个工作任务领取过分块：0 和 1
    assert_eq!(translator.calls().len(), 2);
    for i in 2..5 {
        assert_eq!(translator.attempts_for(&format!("Paragraph number {} has text.", i)), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_chunks_back_off_longer() {
    let translator = Arc::new(Scripted::new(5000, |text, attempt| {
        if attempt == 1 {
            Err(TranslationError::RateLimited {
                message: "429 Too Many Requests".to_string(),
                retry_after: None,
            })
        } else {
            bracket(text)
        }
    }));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let pipeline = pipeline(&translator, 1).with_progress(tx);

    let translated = pipeline.translate_text("slow down", "auto", "fr").await.unwrap();
    assert_eq!(translated, "[slow down]");
    drop(pipeline);

    let mut retries = Vec::new();
    while let Some(event) = rx.recv().await {
        if let Progress::Retrying { delay_ms, attempt, .. } = event {
            retries.push((attempt, delay_ms));
        }
    }
    // 默认初始延迟 2000ms，限流再乘 2
    assert_eq!(retries, vec![(1, 4000)]);
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_never_reach_the_backend() {
    let translator = Arc::new(Scripted::new(40, |text, _| bracket(text)));
    let pipeline = pipeline(&translator, 1);

    let empty = TranslationRequest::new("   ", "fr", BackendKind::FreeScrape);
    let err = pipeline.translate(&empty).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let bad_target = TranslationRequest::new("Hello", "klingon", BackendKind::FreeScrape);
    let err = pipeline.translate(&bad_target).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);

    assert!(translator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn worker_pool_reports_the_exhausted_chunk() {
    let translator = Arc::new(Scripted::new(40, |text, _| {
        if text.contains('3') {
            Err(TranslationError::Network("connection reset".to_string()))
        } else {
            bracket(text)
        }
    }));
    let text = five_paragraphs();

    let err = assert_err!(pipeline(&translator, 3).translate_text(&text, "auto", "fr").await);

    assert_eq!(err.kind(), ErrorKind::ChunkRetryExhausted);
    assert_eq!(err.cause_kind(), ErrorKind::NetworkError);
    assert_eq!(err.failed_chunk_index(), Some(3));
    assert_eq!(translator.attempts_for("Paragraph number 3 has text."), 3);
    assert_eq!(FailureReport::from(&err).failed_chunk_index, Some(3));
}

#[tokio::test(start_paused = true)]
async fn request_for_another_backend_is_refused() {
    let translator = Arc::new(Scripted::new(5000, |text, _| bracket(text)));
    let pipeline = pipeline(&translator, 1);

    let request = TranslationRequest::new("Hello", "fr", BackendKind::PaidApi)
        .with_api_key(ApiKey::new("k:fx"));
    let err = assert_err!(pipeline.translate(&request).await);

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(translator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn request_api_key_is_used_for_the_call() {
    let pipeline = TranslationPipeline::new(Arc::new(Keyed { key: None }), config(1));

    let keyless = TranslationRequest::new("Hello", "fr", BackendKind::PaidApi);
    let err = assert_err!(pipeline.translate(&keyless).await);
    assert_eq!(err.kind(), ErrorKind::AuthError);

    let keyed = keyless.clone().with_api_key(ApiKey::new("k:fx"));
    let translated = assert_ok!(pipeline.translate(&keyed).await);
    assert_eq!(translated, "k:fx:Hello");

    // 请求的密钥只作用于这一次调用
    let err = assert_err!(pipeline.translate(&keyless).await);
    assert_eq!(err.kind(), ErrorKind::AuthError);
}
