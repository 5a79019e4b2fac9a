//! 流式 /v1/chat/completions 客户端
//!
//! 服务端以 SSE 推送增量块，`content` 与 `reasoning_content` 按到达顺序拼接。
//! 流在 `[DONE]` 之前断开时整次调用失败，不返回半截文本。

use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::clients::llm_client::{echo_response, with_think_block, BackendConfig, ResponseBackend};
use crate::error::{ApiError, AppError, AppResult, LlmError};
use crate::models::{Prompt, Turn};

pub struct ChatStreamClient {
    http: reqwest::Client,
    endpoint: String,
    config: BackendConfig,
}

impl ChatStreamClient {
    pub fn new(config: BackendConfig) -> AppResult<Self> {
        Ok(Self {
            http: config.http_client()?,
            endpoint: config.endpoint("/chat/completions"),
            config,
        })
    }

    fn build_request(&self, prompt: &Prompt) -> AppResult<Value> {
        let messages = build_messages(prompt)?;
        Ok(json!({
            "model": self.config.model_name,
            "messages": messages,
            "temperature": self.config.temperature,
            "stream": true,
            "reasoning_effort": self.config.reasoning_effort.as_str(),
        }))
    }
}

/// 把 prompt 转成 OpenAI 消息列表
fn build_messages(prompt: &Prompt) -> AppResult<Vec<ChatCompletionRequestMessage>> {
    match prompt {
        Prompt::Text(text) => Ok(vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(text.as_str())
                .build()?,
        )]),
        Prompt::Turns(turns) => turns.iter().map(build_message).collect(),
    }
}

fn build_message(turn: &Turn) -> AppResult<ChatCompletionRequestMessage> {
    let message = match turn.role.as_str() {
        "system" => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(turn.content.as_str())
                .build()?,
        ),
        "assistant" => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.content.as_str())
                .build()?,
        ),
        _ => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(turn.content.as_str())
                .build()?,
        ),
    };
    Ok(message)
}

#[async_trait]
impl ResponseBackend for ChatStreamClient {
    async fn complete(&self, prompt: &Prompt) -> AppResult<String> {
        debug!("调用 chat completions 流式接口，模型: {}", self.config.model_name);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(prompt)?)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::BadResponse {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut acc = StreamAccumulator::default();

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AppError::api_request_failed(&self.endpoint, e))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                acc.push_line(&String::from_utf8_lossy(&line), &self.endpoint)?;
                if acc.is_done() {
                    break 'read;
                }
            }
        }

        // 最后一行可能没有换行符
        if !acc.is_done() && !buffer.is_empty() {
            acc.push_line(&String::from_utf8_lossy(&buffer), &self.endpoint)?;
        }

        let text = acc.finish(&self.endpoint, &self.config.model_name)?;
        echo_response(&self.config, &text);
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// SSE 增量块累加器
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    reasoning: String,
    content: String,
    saw_reasoning: bool,
    done: bool,
}

impl StreamAccumulator {
    /// 处理一行 SSE 文本
    pub fn push_line(&mut self, line: &str, endpoint: &str) -> AppResult<()> {
        let line = line.trim();
        let Some(data) = line.strip_prefix("data:") else {
            // 空行、注释、event/id 行
            return Ok(());
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let payload: ChunkPayload = serde_json::from_str(data)?;
        if let Some(error) = payload.error {
            return Err(ApiError::BadResponse {
                endpoint: endpoint.to_string(),
                status: 200,
                message: error.to_string(),
            }
            .into());
        }

        if let Some(choice) = payload.choices.into_iter().next() {
            let delta = choice.delta;
            if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning) {
                self.saw_reasoning = true;
                self.reasoning.push_str(&reasoning);
            }
            if let Some(content) = delta.content {
                self.content.push_str(&content);
            }
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// 收尾：未收到 `[DONE]` 视为流中断
    pub fn finish(self, endpoint: &str, model: &str) -> AppResult<String> {
        if !self.done {
            return Err(ApiError::StreamTruncated {
                endpoint: endpoint.to_string(),
            }
            .into());
        }
        if self.content.is_empty() && self.reasoning.is_empty() {
            return Err(LlmError::EmptyResponse {
                model: model.to_string(),
            }
            .into());
        }

        if self.saw_reasoning {
            Ok(with_think_block(&self.reasoning, &self.content))
        } else {
            Ok(self.content)
        }
    }
}
