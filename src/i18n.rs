use serde::{Deserialize, Serialize};

/// 小说的目标语言
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum TargetLanguage {
    #[serde(rename = "zh")]
    #[default]
    Chinese,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "ru")]
    Russian,
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetLanguage::Chinese => write!(f, "zh"),
            TargetLanguage::English => write!(f, "en"),
            TargetLanguage::Japanese => write!(f, "ja"),
            TargetLanguage::Korean => write!(f, "ko"),
            TargetLanguage::German => write!(f, "de"),
            TargetLanguage::French => write!(f, "fr"),
            TargetLanguage::Russian => write!(f, "ru"),
        }
    }
}

impl std::str::FromStr for TargetLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zh" | "chinese" | "中文" => Ok(TargetLanguage::Chinese),
            "en" | "english" | "英文" => Ok(TargetLanguage::English),
            "ja" | "japanese" | "日本語" | "日文" => Ok(TargetLanguage::Japanese),
            "ko" | "korean" | "한국어" | "韩文" => Ok(TargetLanguage::Korean),
            "de" | "german" | "deutsch" | "德文" => Ok(TargetLanguage::German),
            "fr" | "french" | "français" | "法文" => Ok(TargetLanguage::French),
            "ru" | "russian" | "русский" | "俄文" => Ok(TargetLanguage::Russian),
            _ => Err(format!("Unknown target language: {}", s)),
        }
    }
}

impl TargetLanguage {
    /// 获取语言的描述性名称
    pub fn display_name(&self) -> &'static str {
        match self {
            TargetLanguage::Chinese => "中文",
            TargetLanguage::English => "English",
            TargetLanguage::Japanese => "日本語",
            TargetLanguage::Korean => "한국어",
            TargetLanguage::German => "Deutsch",
            TargetLanguage::French => "Français",
            TargetLanguage::Russian => "Русский",
        }
    }

    /// 附加在每个系统提示词末尾的语言指令
    pub fn prompt_instruction(&self) -> &'static str {
        match self {
            TargetLanguage::Chinese => "请使用中文进行创作，语言自然流畅，符合中文读者的阅读习惯。",
            TargetLanguage::English => {
                "Please write in English with natural, fluent prose suited to English-speaking readers. Keep all JSON keys exactly as specified."
            }
            TargetLanguage::Japanese => {
                "日本語で執筆してください。自然で読みやすい文章を心がけ、JSONのキーは指定どおりにしてください。"
            }
            TargetLanguage::Korean => {
                "한국어로 작성해 주세요. 자연스럽고 읽기 쉬운 문장을 사용하고 JSON 키는 지정된 그대로 유지해 주세요."
            }
            TargetLanguage::German => {
                "Bitte schreiben Sie auf Deutsch in natürlicher, flüssiger Sprache. JSON-Schlüssel bleiben unverändert."
            }
            TargetLanguage::French => {
                "Veuillez écrire en français, dans une langue naturelle et fluide. Les clés JSON restent inchangées."
            }
            TargetLanguage::Russian => {
                "Пожалуйста, пишите на русском языке естественно и плавно. Ключи JSON оставляйте без изменений."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("中文".parse::<TargetLanguage>().unwrap(), TargetLanguage::Chinese);
        assert_eq!("EN".parse::<TargetLanguage>().unwrap(), TargetLanguage::English);
        assert!("klingon".parse::<TargetLanguage>().is_err());
    }

    #[test]
    fn test_display_matches_serde_code() {
        assert_eq!(TargetLanguage::Japanese.to_string(), "ja");
        assert_eq!(
            serde_json::to_string(&TargetLanguage::Japanese).unwrap(),
            "\"ja\""
        );
    }
}
