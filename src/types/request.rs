use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

pub const MIN_THEME_CHARS: usize = 5;
pub const MIN_TOTAL_WORDS: u32 = 3000;
pub const MIN_CHAPTERS: u32 = 3;
pub const MAX_CHAPTERS: u32 = 50;
pub const MIN_WORDS_PER_CHAPTER: u32 = 500;

/// 小说类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    UrbanRomance,
    Mystery,
    Scifi,
    Workplace,
    Fantasy,
}

/// 类型的风格要点
pub struct GenreProfile {
    pub name: &'static str,
    pub description: &'static str,
    pub character: &'static str,
    pub plot: &'static str,
    pub language: &'static str,
}

impl Genre {
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::UrbanRomance => "urban_romance",
            Genre::Mystery => "mystery",
            Genre::Scifi => "scifi",
            Genre::Workplace => "workplace",
            Genre::Fantasy => "fantasy",
        }
    }

    pub fn profile(&self) -> GenreProfile {
        match self {
            Genre::UrbanRomance => GenreProfile {
                name: "都市情感",
                description: "现代都市背景的情感故事",
                character: "注重人物心理描写，情感细腻",
                plot: "生活化情节，贴近现实",
                language: "现代流畅，适合都市读者",
            },
            Genre::Mystery => GenreProfile {
                name: "悬疑推理",
                description: "充满谜团和反转的推理故事",
                character: "理性冷静的主角，复杂的配角",
                plot: "层层递进，多重反转",
                language: "紧凑有力，营造悬疑氛围",
            },
            Genre::Scifi => GenreProfile {
                name: "科幻",
                description: "未来世界或科技背景的故事",
                character: "富有想象力，具备科学思维",
                plot: "科技元素驱动情节",
                language: "兼具科学性和文学性",
            },
            Genre::Workplace => GenreProfile {
                name: "职场成长",
                description: "职场背景的成长故事",
                character: "职场新人到资深人士的成长",
                plot: "职场挑战与人际关系",
                language: "专业而不失人情味",
            },
            Genre::Fantasy => GenreProfile {
                name: "奇幻",
                description: "魔法或超自然元素的幻想故事",
                character: "具备特殊能力或使命",
                plot: "冒险与成长并重",
                language: "富有想象力，构建独特世界观",
            },
        }
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Genre {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "urban_romance" => Ok(Genre::UrbanRomance),
            "mystery" => Ok(Genre::Mystery),
            "scifi" => Ok(Genre::Scifi),
            "workplace" => Ok(Genre::Workplace),
            "fantasy" => Ok(Genre::Fantasy),
            _ => Err(format!("Unknown genre: {}", s)),
        }
    }
}

/// 写作风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingStyle {
    #[default]
    Zhihu,
    Humorous,
    Literary,
    Suspenseful,
}

impl WritingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritingStyle::Zhihu => "zhihu",
            WritingStyle::Humorous => "humorous",
            WritingStyle::Literary => "literary",
            WritingStyle::Suspenseful => "suspenseful",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WritingStyle::Zhihu => "知乎风格",
            WritingStyle::Humorous => "轻松幽默",
            WritingStyle::Literary => "文艺细腻",
            WritingStyle::Suspenseful => "紧张刺激",
        }
    }

    /// 风格特点
    pub fn characteristics(&self) -> &'static [&'static str] {
        match self {
            WritingStyle::Zhihu => &[
                "开篇抓人眼球",
                "逻辑清晰",
                "适当加入思考和见解",
                "贴近生活",
                "有一定知识含量",
                "现代白话文，多用短句",
            ],
            WritingStyle::Humorous => &["语言轻松活泼", "适当的幽默元素", "正能量导向", "不失深度"],
            WritingStyle::Literary => &["文字优美", "意境深远", "注重情感表达", "富有诗意"],
            WritingStyle::Suspenseful => &["节奏紧凑", "悬念迭起", "情节跌宕", "引人入胜"],
        }
    }
}

impl std::fmt::Display for WritingStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WritingStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zhihu" => Ok(WritingStyle::Zhihu),
            "humorous" => Ok(WritingStyle::Humorous),
            "literary" => Ok(WritingStyle::Literary),
            "suspenseful" => Ok(WritingStyle::Suspenseful),
            _ => Err(format!("Unknown writing style: {}", s)),
        }
    }
}

fn default_audience() -> String {
    "大众读者".to_string()
}

/// 一次小说生成请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub theme: String,
    /// 为空表示由策划自动判断
    #[serde(default)]
    pub genre: Option<Genre>,
    #[serde(default)]
    pub style: WritingStyle,
    pub target_word_count: u32,
    pub chapter_count: u32,
    #[serde(default = "default_audience")]
    pub target_audience: String,
    /// 配额统计使用的用户标识
    #[serde(default)]
    pub user_id: Option<String>,
}

impl GenerationRequest {
    pub fn new(theme: impl Into<String>, target_word_count: u32, chapter_count: u32) -> Self {
        Self {
            theme: theme.into(),
            genre: None,
            style: WritingStyle::default(),
            target_word_count,
            chapter_count,
            target_audience: default_audience(),
            user_id: None,
        }
    }

    /// 每章目标字数
    pub fn words_per_chapter(&self) -> u32 {
        self.target_word_count / self.chapter_count.max(1)
    }

    /// 校验请求，不合法时返回描述原因的错误
    pub fn validate(&self) -> Result<(), GenerationError> {
        let theme_chars = self.theme.trim().chars().count();
        if theme_chars < MIN_THEME_CHARS {
            return Err(GenerationError::Validation(format!(
                "主题至少需要{}个字符，当前为{}个",
                MIN_THEME_CHARS, theme_chars
            )));
        }
        if self.target_word_count < MIN_TOTAL_WORDS {
            return Err(GenerationError::Validation(format!(
                "目标字数不能少于{}字",
                MIN_TOTAL_WORDS
            )));
        }
        if !(MIN_CHAPTERS..=MAX_CHAPTERS).contains(&self.chapter_count) {
            return Err(GenerationError::Validation(format!(
                "章节数必须在{}到{}之间",
                MIN_CHAPTERS, MAX_CHAPTERS
            )));
        }
        if self.words_per_chapter() < MIN_WORDS_PER_CHAPTER {
            return Err(GenerationError::Validation(format!(
                "每章平均字数不能少于{}字（当前{}字）",
                MIN_WORDS_PER_CHAPTER,
                self.words_per_chapter()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let request = GenerationRequest::new("a detective story in 1920s Shanghai", 6000, 3);
        assert!(request.validate().is_ok());
        assert_eq!(request.words_per_chapter(), 2000);
    }

    #[test]
    fn test_short_theme_is_rejected() {
        let request = GenerationRequest::new("猫", 6000, 3);
        assert!(matches!(
            request.validate(),
            Err(GenerationError::Validation(_))
        ));
    }

    #[test]
    fn test_chapter_bounds() {
        assert!(GenerationRequest::new("a long theme", 6000, 2).validate().is_err());
        assert!(GenerationRequest::new("a long theme", 60000, 51).validate().is_err());
        assert!(GenerationRequest::new("a long theme", 20000, 50).validate().is_err());
        assert!(GenerationRequest::new("a long theme", 25000, 50).validate().is_ok());
    }

    #[test]
    fn test_per_chapter_floor() {
        // 3000 / 7 = 428 < 500
        let request = GenerationRequest::new("a long theme", 3000, 7);
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("每章平均字数"));
    }

    #[test]
    fn test_genre_and_style_serde_names() {
        let json = r#"{"theme":"星际移民的故事","genre":"scifi","style":"literary","target_word_count":9000,"chapter_count":3}"#;
        let request: GenerationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.genre, Some(Genre::Scifi));
        assert_eq!(request.style, WritingStyle::Literary);
        assert_eq!(request.target_audience, "大众读者");
        assert_eq!("urban_romance".parse::<Genre>().unwrap(), Genre::UrbanRomance);
    }
}
