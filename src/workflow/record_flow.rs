//! 记录处理流程 - 流程层
//!
//! 核心职责：定义"一条记录"的完整处理流程
//!
//! 流程顺序：
//! 1. 取出第一条 user 消息（可选：替换固定指令）
//! 2. 调用推理服务
//! 3. 组装输出记录（science：抽取选项、计算 reward、补齐默认字段）

use std::sync::Arc;

use phf::phf_ordered_map;
use serde_json::{Map, Value};

use crate::clients::ResponseBackend;
use crate::config::{Config, Profile, ReasoningEffort};
use crate::error::{AppResult, RecordError};
use crate::models::{ExtraInfo, Prompt, ScienceRecord, Turn, WorkItem};
use crate::services::{compute_reward, LabelExtractor};

/// science 输出记录中透传字段的默认值（顺序即输出顺序）
pub static SCIENCE_DEFAULTS: phf::OrderedMap<&'static str, &'static str> = phf_ordered_map! {
    "category" => "science",
    "license" => "cc-by-4.0",
    "reasoning" => "on",
    "generator" => "",
    "used_in_training" => "",
    "version" => "v1",
    "system_prompt" => "",
};

/// 记录处理流程
///
/// - 不持有任何可变状态，可以被所有 worker 共享
/// - 只依赖推理服务和选项抽取能力
pub struct RecordFlow {
    backend: Arc<dyn ResponseBackend>,
    extractor: LabelExtractor,
    profile: Profile,
    model_name: String,
    reasoning_effort: ReasoningEffort,
}

impl RecordFlow {
    /// 创建新的记录处理流程
    pub fn new(config: &Config, backend: Arc<dyn ResponseBackend>) -> AppResult<Self> {
        Ok(Self {
            backend,
            extractor: LabelExtractor::new(&config.label_letters)?,
            profile: config.profile,
            model_name: config.model_name.clone(),
            reasoning_effort: config.reasoning_effort,
        })
    }

    pub async fn run(&self, item: &WorkItem) -> AppResult<Value> {
        let prompt = self.rewrite_prompt(self.user_prompt(item)?);
        let response = self.backend.complete(&Prompt::Text(prompt.clone())).await?;
        self.assemble(item, &prompt, &response)
    }

    /// 第一条 user 消息
    pub fn user_prompt<'a>(&self, item: &'a WorkItem) -> AppResult<&'a str> {
        item.first_user_turn().ok_or_else(|| {
            RecordError::MissingUserTurn {
                index: item.index.clone(),
            }
            .into()
        })
    }

    /// 固定指令替换，不是通用模板
    pub fn rewrite_prompt(&self, text: &str) -> String {
        match self.profile.instruction_rewrite() {
            Some((from, to)) => text.replace(from, to),
            None => text.to_string(),
        }
    }

    /// 由输入记录和模型回复组装输出记录
    pub fn assemble(&self, item: &WorkItem, prompt: &str, response: &str) -> AppResult<Value> {
        match self.profile {
            Profile::Science => Ok(serde_json::to_value(
                self.assemble_science(item, prompt, response),
            )?),
            Profile::Math => Ok(Value::Object(self.assemble_math(item, response))),
        }
    }

    fn assemble_science(&self, item: &WorkItem, prompt: &str, response: &str) -> ScienceRecord {
        let original_label = item
            .text_field("output")
            .and_then(|output| self.extractor.extract(output));
        let new_label = self.extractor.extract(response);
        let reward = compute_reward(original_label.as_deref(), new_label.as_deref());

        let metadata = SCIENCE_DEFAULTS
            .entries()
            .map(|(key, default)| {
                let value = item
                    .record
                    .get(*key)
                    .cloned()
                    .unwrap_or_else(|| Value::String(default.to_string()));
                (key.to_string(), value)
            })
            .collect::<Map<_, _>>();

        ScienceRecord {
            messages: vec![Turn::user(prompt), Turn::assistant(response)],
            metadata,
            model_name: self.model_name.clone(),
            reasoning_effort: self.reasoning_effort.as_str().to_string(),
            label: original_label.clone(),
            original_label,
            new_label,
            reward,
            extra_info: ExtraInfo {
                index: item.index.clone(),
            },
        }
    }

    fn assemble_math(&self, item: &WorkItem, response: &str) -> Map<String, Value> {
        let mut record = item.record.clone();
        record.insert(
            response_field(&self.model_name),
            Value::String(response.to_string()),
        );
        record.insert(
            "model_name".to_string(),
            Value::String(self.model_name.clone()),
        );
        record.insert(
            "reasoning_effort".to_string(),
            Value::String(self.reasoning_effort.as_str().to_string()),
        );
        record
    }
}

/// 透传记录中存放回复的字段名，例如 `gpt-oss-120b/` → `gpt-oss-120b-response`
pub fn response_field(model_name: &str) -> String {
    let short = model_name
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(model_name);
    format!("{}-response", short)
}
