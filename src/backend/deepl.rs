use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{classify_status, retry_after, Translator};
use crate::error::{Result, TranslationError};
use crate::language;
use crate::types::{ApiKey, DeepLResponse};

const FREE_ENDPOINT: &str = "https://api-free.deepl.com/v2/translate";
const PRO_ENDPOINT: &str = "https://api.deepl.com/v2/translate";
const DEFAULT_MAX_CHUNK_CHARS: usize = 4500;

/// DeepL 付费 API
///
/// 以 `:fx` 结尾的密钥属于免费套餐，使用 `api-free.deepl.com`。
#[derive(Clone)]
pub struct DeepLTranslator {
    client: Client,
    api_key: Option<ApiKey>,
    endpoint: Option<String>,
    max_chunk_chars: usize,
}

impl DeepLTranslator {
    pub fn new(client: Client, api_key: Option<ApiKey>) -> Self {
        Self {
            client,
            api_key,
            endpoint: None,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.max_chunk_chars = max_chunk_chars.max(1);
        self
    }

    fn endpoint_for(&self, key: &ApiKey) -> &str {
        match &self.endpoint {
            Some(endpoint) => endpoint.as_str(),
            None if key.expose().trim().ends_with(":fx") => FREE_ENDPOINT,
            None => PRO_ENDPOINT,
        }
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    fn name(&self) -> &'static str {
        "paid_api"
    }

    fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    fn with_api_key(&self, api_key: &ApiKey) -> Option<Arc<dyn Translator>> {
        Some(Arc::new(Self {
            api_key: Some(api_key.clone()),
            ..self.clone()
        }))
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        let key = match &self.api_key {
            Some(key) if !key.is_blank() => key,
            _ => {
                return Err(TranslationError::Auth(
                    "DeepL API key is required, configure it in settings".to_string(),
                ))
            }
        };

        let target = language::deepl_target(target_lang)?;
        let source = language::deepl_source(source_lang)?;

        let mut params = vec![("text", text.to_string()), ("target_lang", target.to_string())];
        if let Some(source) = source {
            params.push(("source_lang", source));
        }

        let endpoint = self.endpoint_for(key);
        debug!("DeepL 翻译请求: {} -> {}, {}", source_lang, target, endpoint);

        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", key.expose().trim()))
            .form(&params)
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

fn parse_reply(body: &str) -> Result<String> {
    let reply: DeepLResponse = serde_json::from_str(body)
        .map_err(|e| TranslationError::network(format!("unreadable DeepL reply: {}", e)))?;

    let translation = reply
        .translations
        .into_iter()
        .next()
        .ok_or_else(|| TranslationError::network("DeepL returned no translation"))?;

    if let Some(detected) = &translation.detected_source_language {
        debug!("DeepL 检测到源语言: {}", detected);
    }

    Ok(translation.text)
}
