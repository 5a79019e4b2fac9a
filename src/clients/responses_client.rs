//! /v1/responses 客户端
//!
//! 非流式接口，推理过程和最终回答分别放在不同的 output 块中。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::clients::llm_client::{echo_response, with_think_block, BackendConfig, ResponseBackend};
use crate::error::{ApiError, AppError, AppResult, LlmError};
use crate::models::Prompt;

const INSTRUCTIONS: &str = "You are a helpful assistant.";

pub struct ResponsesClient {
    http: reqwest::Client,
    endpoint: String,
    config: BackendConfig,
}

impl ResponsesClient {
    pub fn new(config: BackendConfig) -> AppResult<Self> {
        Ok(Self {
            http: config.http_client()?,
            endpoint: config.endpoint("/responses"),
            config,
        })
    }

    fn build_request(&self, prompt: &Prompt) -> Value {
        let input = match prompt {
            Prompt::Text(text) => json!(text),
            Prompt::Turns(turns) => json!(turns),
        };
        json!({
            "model": self.config.model_name,
            "instructions": INSTRUCTIONS,
            "input": input,
            "reasoning": { "effort": self.config.reasoning_effort.as_str() },
        })
    }
}

#[async_trait]
impl ResponseBackend for ResponsesClient {
    async fn complete(&self, prompt: &Prompt) -> AppResult<String> {
        debug!("调用 responses API，模型: {}", self.config.model_name);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&self.endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(&self.endpoint, e))?;

        if !status.is_success() {
            return Err(ApiError::BadResponse {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        let payload: ResponsesPayload = serde_json::from_str(&body)?;
        let text = combine_output(&payload, &self.config.model_name)?;

        echo_response(&self.config, &text);
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[derive(Debug, Deserialize)]
struct ResponsesPayload {
    #[serde(default)]
    output: Option<Vec<OutputItem>>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<Vec<ContentBlock>>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// 收集某类 output 块中某类 content 的文本
fn collect_text(items: &[OutputItem], item_kind: &str, block_kind: &str, sep: &str) -> String {
    items
        .iter()
        .filter(|item| item.kind == item_kind)
        .flat_map(|item| item.content.iter().flatten())
        .filter(|block| block.kind == block_kind)
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join(sep)
}

/// 推理文本缺失时视为空，不沿用任何旧值
fn combine_output(payload: &ResponsesPayload, model: &str) -> AppResult<String> {
    let items = match payload.output.as_deref() {
        Some(items) if !items.is_empty() => items,
        _ => {
            return Err(LlmError::EmptyResponse {
                model: model.to_string(),
            }
            .into())
        }
    };

    let reasoning = collect_text(items, "reasoning", "reasoning_text", "\n");
    let answer = collect_text(items, "message", "output_text", "");

    Ok(with_think_block(&reasoning, &answer))
}
