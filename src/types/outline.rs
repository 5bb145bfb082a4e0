use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 人物档案
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CharacterProfile {
    pub name: String,
    /// 模型可能返回数字或文字描述
    pub age: Option<Value>,
    pub occupation: Option<String>,
    pub personality: Option<String>,
    pub motivation: Option<String>,
    /// 角色成长弧线
    pub arc: Option<String>,
    pub background: Option<String>,
    /// 配角的角色定位
    pub role: Option<String>,
    pub relationship: Option<String>,
    /// 重要程度(1-5)
    pub importance: Option<Value>,
}

/// 人物设定：主角与配角
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CharacterSheets {
    pub protagonist: Option<CharacterProfile>,
    pub supporting: Vec<CharacterProfile>,
}

impl CharacterSheets {
    /// 全部有名字的人物，主角在前
    pub fn names(&self) -> Vec<&str> {
        self.protagonist
            .iter()
            .chain(self.supporting.iter())
            .map(|c| c.name.as_str())
            .filter(|name| !name.trim().is_empty())
            .collect()
    }
}

/// 章节大纲
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterOutline {
    /// 从1开始的章节序号
    pub index: u32,
    pub title: String,
    pub summary: String,
    pub key_events: Vec<String>,
    pub characters_involved: Vec<String>,
    pub mood: String,
    pub target_word_count: u32,
}

/// 故事大纲，由策划生成后只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryOutline {
    pub title: String,
    pub subtitle: Option<String>,
    pub author_note: String,
    pub one_line_pitch: String,
    pub genre: String,
    pub theme: String,
    pub tone: String,
    pub characters: CharacterSheets,
    pub world_setting: Map<String, Value>,
    pub plot_structure: Map<String, Value>,
    pub chapter_outlines: Vec<ChapterOutline>,
    pub themes_to_explore: Vec<String>,
    pub key_symbols: Vec<String>,
    pub target_readers: String,
}

impl StoryOutline {
    pub fn chapter(&self, index: u32) -> Option<&ChapterOutline> {
        index
            .checked_sub(1)
            .and_then(|i| self.chapter_outlines.get(i as usize))
    }

    pub fn chapter_count(&self) -> usize {
        self.chapter_outlines.len()
    }
}
