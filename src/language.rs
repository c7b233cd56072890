//! 语言代码
//!
//! 支持的语言代码表，以及 DeepL 使用的代码映射。

use crate::error::{Result, TranslationError};

/// 自动检测源语言
pub const AUTO: &str = "auto";

/// 支持的语言，(代码, 名称)
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("af", "Afrikaans"),
    ("sq", "Albanian"),
    ("am", "Amharic"),
    ("ar", "Arabic"),
    ("hy", "Armenian"),
    ("az", "Azerbaijani"),
    ("eu", "Basque"),
    ("be", "Belarusian"),
    ("bn", "Bengali"),
    ("bs", "Bosnian"),
    ("bg", "Bulgarian"),
    ("ca", "Catalan"),
    ("ceb", "Cebuano"),
    ("zh-cn", "Chinese (Simplified)"),
    ("zh-tw", "Chinese (Traditional)"),
    ("co", "Corsican"),
    ("hr", "Croatian"),
    ("cs", "Czech"),
    ("da", "Danish"),
    ("nl", "Dutch"),
    ("en", "English"),
    ("eo", "Esperanto"),
    ("et", "Estonian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("fy", "Frisian"),
    ("gl", "Galician"),
    ("ka", "Georgian"),
    ("de", "German"),
    ("el", "Greek"),
    ("gu", "Gujarati"),
    ("ht", "Haitian Creole"),
    ("ha", "Hausa"),
    ("haw", "Hawaiian"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hmn", "Hmong"),
    ("hu", "Hungarian"),
    ("is", "Icelandic"),
    ("ig", "Igbo"),
    ("id", "Indonesian"),
    ("ga", "Irish"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("jw", "Javanese"),
    ("kn", "Kannada"),
    ("kk", "Kazakh"),
    ("km", "Khmer"),
    ("ko", "Korean"),
    ("ku", "Kurdish"),
    ("ky", "Kyrgyz"),
    ("lo", "Lao"),
    ("la", "Latin"),
    ("lv", "Latvian"),
    ("lt", "Lithuanian"),
    ("lb", "Luxembourgish"),
    ("mk", "Macedonian"),
    ("mg", "Malagasy"),
    ("ms", "Malay"),
    ("ml", "Malayalam"),
    ("mt", "Maltese"),
    ("mi", "Maori"),
    ("mr", "Marathi"),
    ("mn", "Mongolian"),
    ("my", "Myanmar"),
    ("ne", "Nepali"),
    ("no", "Norwegian"),
    ("ny", "Nyanja"),
    ("ps", "Pashto"),
    ("fa", "Persian"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("pa", "Punjabi"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sm", "Samoan"),
    ("gd", "Scots Gaelic"),
    ("sr", "Serbian"),
    ("st", "Sesotho"),
    ("sn", "Shona"),
    ("sd", "Sindhi"),
    ("si", "Sinhala"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("so", "Somali"),
    ("es", "Spanish"),
    ("su", "Sundanese"),
    ("sw", "Swahili"),
    ("sv", "Swedish"),
    ("tl", "Tagalog"),
    ("tg", "Tajik"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("ur", "Urdu"),
    ("uz", "Uzbek"),
    ("vi", "Vietnamese"),
    ("cy", "Welsh"),
    ("xh", "Xhosa"),
    ("yi", "Yiddish"),
    ("yo", "Yoruba"),
    ("zu", "Zulu"),
];

/// DeepL 支持的目标语言映射
const DEEPL_TARGETS: &[(&str, &str)] = &[
    ("en", "EN-US"),
    ("es", "ES"),
    ("fr", "FR"),
    ("de", "DE"),
    ("it", "IT"),
    ("pt", "PT-PT"),
    ("pl", "PL"),
    ("ru", "RU"),
    ("ja", "JA"),
    ("zh-cn", "ZH-HANS"),
    ("zh-tw", "ZH-HANT"),
    ("nl", "NL"),
    ("sv", "SV"),
    ("da", "DA"),
    ("fi", "FI"),
    ("el", "EL"),
    ("cs", "CS"),
    ("ro", "RO"),
    ("hu", "HU"),
    ("sk", "SK"),
    ("bg", "BG"),
    ("et", "ET"),
    ("lv", "LV"),
    ("lt", "LT"),
    ("sl", "SL"),
    ("tr", "TR"),
    ("id", "ID"),
    ("uk", "UK"),
    ("ko", "KO"),
    ("no", "NB"),
];

fn normalize(code: &str) -> String {
    code.trim().to_ascii_lowercase().replace('_', "-")
}

/// 代码是否在支持列表中（"auto"不算）
pub fn is_supported(code: &str) -> bool {
    let code = normalize(code);
    SUPPORTED_LANGUAGES.iter().any(|(c, _)| *c == code)
}

/// 语言名称
pub fn language_name(code: &str) -> Option<&'static str> {
    let code = normalize(code);
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// 校验源语言：受支持的代码或 "auto"
pub fn validate_source(code: &str) -> Result<()> {
    if normalize(code) == AUTO || is_supported(code) {
        Ok(())
    } else {
        Err(TranslationError::UnsupportedLanguage(format!(
            "source language '{}'",
            code
        )))
    }
}

/// 校验目标语言："auto" 不能作为目标语言
pub fn validate_target(code: &str) -> Result<()> {
    if is_supported(code) {
        Ok(())
    } else {
        Err(TranslationError::UnsupportedLanguage(format!(
            "target language '{}'",
            code
        )))
    }
}

/// 转换为 DeepL 目标语言代码
pub fn deepl_target(code: &str) -> Result<&'static str> {
    let code = normalize(code);
    DEEPL_TARGETS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, deepl)| *deepl)
        .ok_or_else(|| {
            TranslationError::UnsupportedLanguage(format!(
                "target language '{}' is not available on DeepL",
                code
            ))
        })
}

/// 转换为 DeepL 源语言代码，"auto" 返回 `None`（由 DeepL 自动检测）
///
/// DeepL 的源语言不区分地区变体，例如 `EN-US` 作为源语言写作 `EN`。
pub fn deepl_source(code: &str) -> Result<Option<String>> {
    if normalize(code) == AUTO {
        return Ok(None);
    }
    let target = deepl_target(code).map_err(|_| {
        TranslationError::UnsupportedLanguage(format!(
            "source language '{}' is not available on DeepL",
            code
        ))
    })?;
    let base = target.split('-').next().unwrap_or(target);
    Ok(Some(base.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn recognizes_supported_codes() {
        assert!(is_supported("fr"));
        assert!(is_supported("ZH-CN"));
        assert!(is_supported("zh_tw"));
        assert!(!is_supported("auto"));
        assert!(!is_supported("xx"));
        assert_eq!(language_name("haw"), Some("Hawaiian"));
    }

    #[test]
    fn auto_is_only_valid_as_source() {
        assert!(validate_source("auto").is_ok());
        let err = validate_target("auto").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
    }

    #[test]
    fn maps_codes_for_deepl() {
        assert_eq!(deepl_target("en").unwrap(), "EN-US");
        assert_eq!(deepl_target("no").unwrap(), "NB");
        assert_eq!(deepl_target("zh-tw").unwrap(), "ZH-HANT");
        assert_eq!(deepl_source("pt").unwrap(), Some("PT".to_string()));
        assert_eq!(deepl_source("auto").unwrap(), None);
    }

    #[test]
    fn rejects_codes_deepl_lacks() {
        let err = deepl_target("sw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
        assert!(deepl_source("haw").is_err());
    }
}
