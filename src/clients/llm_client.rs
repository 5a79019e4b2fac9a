//! 推理服务客户端
//!
//! 一个能力（"把一个 prompt 变成推理 + 回答文本"），两种协议实现：
//! - `ResponsesClient`: 非流式 /v1/responses
//! - `ChatStreamClient`: 流式 /v1/chat/completions

use std::sync::Arc;
use std::time::Duration;

use async_openai::config::{Config as _, OpenAIConfig};
use async_trait::async_trait;
use tracing::info;

use crate::clients::{ChatStreamClient, ResponsesClient};
use crate::config::{BackendKind, ReasoningEffort};
use crate::error::{AppResult, ConfigError};
use crate::models::Prompt;
use crate::utils::logging::truncate_text;

/// 推理块的起止标记
pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// 客户端配置，构造后不再修改
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub model_name: String,
    pub host: String,
    pub port: u16,
    pub reasoning_effort: ReasoningEffort,
    /// 是否在日志中回显响应
    pub verbose: bool,
    pub timeout: Duration,
    pub api_key: String,
    pub temperature: f32,
}

impl BackendConfig {
    pub fn api_base(&self) -> String {
        format!("http://{}:{}/v1", self.host, self.port)
    }

    /// 拼接接口地址，例如 `/responses`
    pub fn endpoint(&self, path: &str) -> String {
        OpenAIConfig::new()
            .with_api_base(self.api_base())
            .with_api_key(&self.api_key)
            .url(path)
    }

    /// 构建共享的 HTTP 客户端
    pub fn http_client(&self) -> AppResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|source| ConfigError::HttpClientFailed { source }.into())
    }
}

/// 推理服务能力
///
/// 实现必须是无状态的：同一个实例会被所有 worker 共享。
#[async_trait]
pub trait ResponseBackend: Send + Sync {
    /// 发送一次请求，返回 `<think>推理</think>回答` 或纯回答文本
    async fn complete(&self, prompt: &Prompt) -> AppResult<String>;

    fn model_name(&self) -> &str;
}

/// 根据配置选择协议实现
pub fn build_backend(config: BackendConfig, kind: BackendKind) -> AppResult<Arc<dyn ResponseBackend>> {
    let backend: Arc<dyn ResponseBackend> = match kind {
        BackendKind::Responses => Arc::new(ResponsesClient::new(config)?),
        BackendKind::ChatStream => Arc::new(ChatStreamClient::new(config)?),
    };
    Ok(backend)
}

/// 把推理过程和最终回答拼成一段文本
pub fn with_think_block(reasoning: &str, answer: &str) -> String {
    format!("{}{}{}{}", THINK_OPEN, reasoning, THINK_CLOSE, answer)
}

/// verbose 模式下回显响应
pub(crate) fn echo_response(config: &BackendConfig, text: &str) {
    if config.verbose {
        info!("💬 [{}] {}", config.model_name, truncate_text(text, 2000));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig {
            model_name: "gpt-oss-120b".to_string(),
            host: "localhost".to_string(),
            port: 1145,
            reasoning_effort: ReasoningEffort::Low,
            verbose: false,
            timeout: Duration::from_secs(10),
            api_key: "EMPTY".to_string(),
            temperature: 1.0,
        }
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            config().endpoint("/chat/completions"),
            "http://localhost:1145/v1/chat/completions"
        );
    }

    #[test]
    fn test_with_think_block() {
        assert_eq!(with_think_block("", "B"), "<think></think>B");
        assert_eq!(with_think_block("hmm", "B"), "<think>hmm</think>B");
    }
}
