use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 记录索引（断点续跑的唯一键）
///
/// 既可以是输入文件中的行位置，也可以是记录自带的 `extra_info.index`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemIndex {
    Number(u64),
    Text(String),
}

impl fmt::Display for ItemIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemIndex::Number(n) => write!(f, "{}", n),
            ItemIndex::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for ItemIndex {
    fn from(n: u64) -> Self {
        ItemIndex::Number(n)
    }
}

impl From<usize> for ItemIndex {
    fn from(n: usize) -> Self {
        ItemIndex::Number(n as u64)
    }
}

/// 一轮对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// 发送给推理服务的提示词
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// 单条用户消息
    Text(String),
    /// 结构化的多轮消息
    Turns(Vec<Turn>),
}

/// 一条待处理的输入记录
///
/// 启动时读取一次，之后不再修改。`record` 保存原始 JSON 对象，
/// 所有透传字段都从这里取。
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub index: ItemIndex,
    pub turns: Vec<Turn>,
    pub record: Map<String, Value>,
}

impl WorkItem {
    /// 第一条 role 为 user 的消息内容
    pub fn first_user_turn(&self) -> Option<&str> {
        self.turns
            .iter()
            .find(|t| t.role == "user")
            .map(|t| t.content.as_str())
    }

    /// 读取透传字段中的字符串
    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.record.get(key).and_then(Value::as_str)
    }
}

/// 输出记录中的断点键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraInfo {
    pub index: ItemIndex,
}

/// science 任务的输出记录
///
/// 字段顺序即输出 JSON 的字段顺序。
#[derive(Debug, Clone, Serialize)]
pub struct ScienceRecord {
    pub messages: Vec<Turn>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
    pub model_name: String,
    pub reasoning_effort: String,
    pub original_label: Option<String>,
    pub new_label: Option<String>,
    pub label: Option<String>,
    pub reward: f64,
    pub extra_info: ExtraInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_index_untagged() {
        let n: ItemIndex = serde_json::from_value(json!(7)).unwrap();
        let s: ItemIndex = serde_json::from_value(json!("q-7")).unwrap();
        assert_eq!(n, ItemIndex::Number(7));
        assert_eq!(s, ItemIndex::Text("q-7".to_string()));
        assert_eq!(serde_json::to_value(&n).unwrap(), json!(7));
        assert_eq!(s.to_string(), "q-7");
    }

    #[test]
    fn test_first_user_turn_skips_system() {
        let item = WorkItem {
            index: 0usize.into(),
            turns: vec![
                Turn {
                    role: "system".to_string(),
                    content: "be brief".to_string(),
                },
                Turn::user("2+2?"),
                Turn::user("ignored"),
            ],
            record: Map::new(),
        };
        assert_eq!(item.first_user_turn(), Some("2+2?"));
    }
}
