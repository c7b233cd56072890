//! 配置管理模块
//!
//! 提供TOML设置文件的读取、写入、自动发现和环境变量覆盖。

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TranslationError};
use crate::types::{ApiKey, BackendConfig, PipelineConfig};

/// 选择后端的环境变量
pub const ENV_BACKEND: &str = "DOC_TRANSLATOR_BACKEND";
/// DeepL 密钥的环境变量
pub const ENV_DEEPL_API_KEY: &str = "DEEPL_API_KEY";
/// 聚合服务地址的环境变量
pub const ENV_AGGREGATOR_URL: &str = "DOC_TRANSLATOR_AGGREGATOR_URL";

const DEFAULT_LOCATIONS: [&str; 3] = [
    "doc-translator.toml",
    "config.toml",
    ".doc-translator.toml",
];

/// 设置文件
///
/// # 示例
///
/// ```rust,no_run
/// use doc_translator::Settings;
///
/// // 从默认位置加载配置
/// let settings = Settings::load_from_default_locations();
///
/// // 从指定文件加载配置
/// let settings = Settings::from_file("doc-translator.toml").unwrap();
///
/// // 保存配置到文件
/// settings.save_to_file("output.toml").unwrap();
/// ```
///
/// ```toml
/// [backend]
/// kind = "paid_api"
/// api_key = "xxxxxxxx:fx"
/// aggregator_url = "http://localhost:1188/translate"
/// timeout_secs = 30
///
/// [pipeline]
/// max_concurrent_chunks = 1
/// max_requests_per_second = 2.0
/// lookback_ratio = 0.5
///
/// [pipeline.retry]
/// max_attempts = 3
/// initial_delay_ms = 2000
/// max_delay_ms = 30000
/// backoff_multiplier = 2.0
/// rate_limit_multiplier = 2.0
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load settings from the first existing default location, then apply
    /// environment overrides
    pub fn load_from_default_locations() -> Self {
        let mut settings = Self::find_in_default_locations().unwrap_or_else(|| {
            info!("No settings file found, using defaults");
            Self::default()
        });
        settings.apply_env_overrides();
        settings
    }

    fn find_in_default_locations() -> Option<Self> {
        for path in DEFAULT_LOCATIONS {
            if !Path::new(path).exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(settings) => {
                    info!("Loaded settings from: {}", path);
                    return Some(settings);
                }
                Err(e) => warn!("Failed to load settings from {}: {}", path, e),
            }
        }
        None
    }

    /// Generate an example settings file
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::default().save_to_file(path)
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup(ENV_BACKEND) {
            match backend.parse() {
                Ok(kind) => {
                    info!("环境变量覆盖翻译后端: {}", kind);
                    self.backend.kind = kind;
                }
                Err(e) => warn!("忽略 {}: {}", ENV_BACKEND, e),
            }
        }

        if let Some(key) = lookup(ENV_DEEPL_API_KEY).filter(|k| !k.trim().is_empty()) {
            info!("环境变量提供了 DeepL API 密钥");
            self.backend.api_key = Some(ApiKey::new(key.trim()));
        }

        if let Some(url) = lookup(ENV_AGGREGATOR_URL).filter(|u| !u.trim().is_empty()) {
            info!("环境变量覆盖聚合服务地址: {}", url);
            self.backend.aggregator_url = url.trim().to_string();
        }
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.retry.max_attempts == 0 {
            return Err(TranslationError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.pipeline.max_concurrent_chunks == 0 {
            return Err(TranslationError::Config(
                "max_concurrent_chunks must be at least 1".to_string(),
            ));
        }
        if self.pipeline.max_requests_per_second < 0.0 {
            return Err(TranslationError::Config(
                "max_requests_per_second cannot be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.pipeline.lookback_ratio) {
            return Err(TranslationError::Config(
                "lookback_ratio must be between 0 and 1".to_string(),
            ));
        }
        if self.backend.max_chunk_chars == Some(0) {
            return Err(TranslationError::Config(
                "max_chunk_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
