use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{classify_status, retry_after, Translator};
use crate::error::{Result, TranslationError};
use crate::language;

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
const DEFAULT_MAX_CHUNK_CHARS: usize = 4500;

/// 免费的 Google 网页翻译接口（`client=gtx`），无需密钥
#[derive(Clone)]
pub struct FreeScrapeTranslator {
    client: Client,
    endpoint: String,
    max_chunk_chars: usize,
}

impl FreeScrapeTranslator {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.max_chunk_chars = max_chunk_chars.max(1);
        self
    }
}

#[async_trait]
impl Translator for FreeScrapeTranslator {
    fn name(&self) -> &'static str {
        "free_scrape"
    }

    fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        language::validate_source(source_lang)?;
        language::validate_target(target_lang)?;

        let sl = google_code(source_lang);
        let tl = google_code(target_lang);
        debug!("Google 翻译请求: {} -> {}, {} 字符", sl, tl, text.chars().count());

        // 长文本放在表单里，避免 URL 过长
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("client", "gtx"), ("sl", sl.as_str()), ("tl", tl.as_str()), ("dt", "t")])
            .form(&[("q", text)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let hint = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(self.name(), status, &body, hint));
        }

        let body = response.text().await?;
        parse_reply(&body)
    }
}

/// Google 使用 `zh-CN` / `zh-TW` 这样的大小写
fn google_code(code: &str) -> String {
    let code = code.trim().to_ascii_lowercase().replace('_', "-");
    match code.split_once('-') {
        Some((lang, region)) => format!("{}-{}", lang, region.to_ascii_uppercase()),
        None => code,
    }
}

/// 解析嵌套数组格式的响应：`[[["译文","原文",...],...],null,"en",...]`
fn parse_reply(body: &str) -> Result<String> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| TranslationError::network(format!("unreadable Google reply: {}", e)))?;

    let sentences = json
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| TranslationError::network("Google reply has no sentences"))?;

    let translated: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(|s| s.as_str()))
        .collect();

    if translated.is_empty() {
        return Err(TranslationError::network("Google returned an empty translation"));
    }

    Ok(translated)
}
