use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{classify_status, retry_after, Translator};
use crate::error::{Result, TranslationError};
use crate::language;
use crate::types::{DeepLXRequest, DeepLXResponse};

const DEFAULT_MAX_CHUNK_CHARS: usize = 3000;

/// DeepLX 兼容的翻译聚合服务
///
/// 支持标准 DeepLX 接口（`{code, data}`）和 `dptrans` 变体，
/// 也能接受 `translated_text` / `result` / `translation` 等字段或纯文本响应。
#[derive(Clone)]
pub struct AggregatorTranslator {
    client: Client,
    api_url: String,
    max_chunk_chars: usize,
}

impl AggregatorTranslator {
    pub fn new<S: Into<String>>(client: Client, api_url: S) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }

    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.max_chunk_chars = max_chunk_chars.max(1);
        self
    }

    fn is_dptrans(&self) -> bool {
        self.api_url.contains("dptrans")
    }
}

#[async_trait]
impl Translator for AggregatorTranslator {
    fn name(&self) -> &'static str {
        "aggregator"
    }

    fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        language::validate_source(source_lang)?;
        language::validate_target(target_lang)?;

        debug!("发送翻译请求到: {}", self.api_url);

        let request = DeepLXRequest {
            text: text.to_string(),
            source_lang: aggregator_source(source_lang),
            target_lang: aggregator_target(target_lang),
        };

        let mut builder = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json");

        builder = if self.is_dptrans() {
            debug!("使用dptrans API格式请求");
            builder
                .header("Accept", "application/json, text/plain, */*")
                .header(
                    "User-Agent",
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
                )
        } else {
            builder.header("Accept", "application/json")
        };

        let response = builder.json(&request).send().await?;

        let status = response.status();
        debug!("DeepLX响应状态: {}", status);

        if !status.is_success() {
            let hint = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(self.name(), status, &body, hint));
        }

        let body = response.text().await?;
        parse_reply(&body)
    }
}

/// 优先使用 DeepL 代码，聚合服务自己支持的其它语言原样转大写
fn aggregator_target(code: &str) -> String {
    language::deepl_target(code)
        .map(str::to_string)
        .unwrap_or_else(|_| code.trim().to_ascii_uppercase())
}

fn aggregator_source(code: &str) -> String {
    match language::deepl_source(code) {
        Ok(Some(deepl)) => deepl,
        Ok(None) => "auto".to_string(),
        Err(_) => code.trim().to_ascii_uppercase(),
    }
}

fn parse_reply(body: &str) -> Result<String> {
    if let Ok(result) = serde_json::from_str::<DeepLXResponse>(body) {
        return match result.code {
            200 if result.data.is_empty() => {
                Err(TranslationError::network("DeepLX returned an empty translation"))
            }
            200 => Ok(result.data),
            401 | 403 => Err(TranslationError::Auth(format!(
                "DeepLX rejected the request with code {}",
                result.code
            ))),
            429 => Err(TranslationError::rate_limited(
                "DeepLX upstream is rate limited (code 429)",
                None,
            )),
            code => Err(TranslationError::network(format!(
                "DeepLX translation failed with code {}",
                code
            ))),
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(TranslationError::network("API returned an empty translation"));
    }

    if trimmed.starts_with('{') {
        let json: serde_json::Value = serde_json::from_str(trimmed).map_err(|_| {
            TranslationError::network(format!("unreadable JSON reply: {}", trimmed))
        })?;

        return json
            .get("translated_text")
            .or_else(|| json.get("result"))
            .or_else(|| json.get("translation"))
            .or_else(|| json.get("data"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                TranslationError::network(format!("no translation field in reply: {}", trimmed))
            });
    }

    if trimmed.starts_with('<') {
        return Err(TranslationError::network(format!(
            "unexpected HTML reply: {}",
            trimmed.chars().take(80).collect::<String>()
        )));
    }

    debug!("假设响应是纯文本翻译结果");
    Ok(body.to_string())
}
