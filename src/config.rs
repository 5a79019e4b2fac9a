use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::clients::BackendConfig;
use crate::error::{AppError, AppResult};

/// 原始数据集里的作答格式要求
pub const ORIGINAL_INST: &str = r#"Remember to put your answer on its own line after "Answer:"."#;
/// 替换后的思维链作答要求
pub const COT_INST: &str = r"Let's think step by step and output your final answer within \boxed{{}}.";

/// 推理强度
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

/// 推理服务协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// 非流式 /v1/responses，推理与回答分块返回
    Responses,
    /// 流式 /v1/chat/completions
    ChatStream,
}

/// 数据集格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// 选择题：消息在 `input`，按行号编号，抽取选项并计算 reward
    Science,
    /// 数学题：消息在 `prompt`，使用 `extra_info.index`，原记录透传
    Math,
}

impl Profile {
    /// 存放对话消息的字段名
    pub fn turns_field(self) -> &'static str {
        match self {
            Profile::Science => "input",
            Profile::Math => "prompt",
        }
    }

    /// 是否使用记录自带的 `extra_info.index`
    pub fn explicit_index(self) -> bool {
        matches!(self, Profile::Math)
    }

    /// 发送前的固定指令替换 (from, to)
    pub fn instruction_rewrite(self) -> Option<(&'static str, &'static str)> {
        match self {
            Profile::Science => None,
            Profile::Math => Some((ORIGINAL_INST, COT_INST)),
        }
    }
}

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(name = "collect_responses")]
#[command(about = "Run resumable batch inference against an OpenAI-compatible server", long_about = None)]
pub struct CliArgs {
    /// Path to input JSONL file
    #[arg(long = "raw_path")]
    pub raw_path: PathBuf,

    /// Path to output JSONL file (appended to, never rewritten)
    #[arg(long = "output_path")]
    pub output_path: PathBuf,

    /// Model name/path served by the backend
    #[arg(long = "model_name")]
    pub model_name: String,

    /// Reasoning effort level
    #[arg(long = "reasoning_effort", value_enum, default_value = "low")]
    pub reasoning_effort: ReasoningEffort,

    /// Number of concurrent in-flight requests
    #[arg(long = "max_workers", default_value_t = 32)]
    pub max_workers: usize,

    /// Backend host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Backend port
    #[arg(long, default_value_t = 1145)]
    pub port: u16,

    /// Maximum number of input lines to process (default: all)
    #[arg(long = "max_lines")]
    pub max_lines: Option<usize>,

    /// Backend protocol
    #[arg(long, value_enum, default_value = "responses")]
    pub api: BackendKind,

    /// Dataset layout
    #[arg(long, value_enum, default_value = "science")]
    pub profile: Profile,

    /// Valid option letters for label extraction
    #[arg(long = "label_letters", default_value = "ABCDEFGHIJ")]
    pub label_letters: String,

    /// Sampling temperature (chat-stream only)
    #[arg(long, default_value_t = 1.0)]
    pub temperature: f32,

    /// Per-request timeout in seconds
    #[arg(long = "timeout_secs", default_value_t = 36_000)]
    pub timeout_secs: u64,

    /// Echo every response to the log
    #[arg(long)]
    pub verbose: bool,
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    pub raw_path: PathBuf,
    pub output_path: PathBuf,
    pub model_name: String,
    pub reasoning_effort: ReasoningEffort,
    /// 同时在途的请求数量
    pub max_workers: usize,
    pub host: String,
    pub port: u16,
    pub max_lines: Option<usize>,
    pub api: BackendKind,
    pub profile: Profile,
    pub label_letters: String,
    pub temperature: f32,
    pub timeout: Duration,
    /// 是否在日志中回显每条响应
    pub verbose: bool,
    pub api_key: String,
}

impl Config {
    /// 从命令行参数构建配置，并读取环境变量中的密钥
    pub fn from_args(args: CliArgs) -> AppResult<Self> {
        if args.max_workers == 0 {
            return Err(AppError::invalid_value("--max_workers", "0", "大于 0 的整数"));
        }
        if args.max_lines == Some(0) {
            return Err(AppError::invalid_value("--max_lines", "0", "大于 0 的整数"));
        }
        if args.label_letters.is_empty()
            || !args.label_letters.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(AppError::invalid_value(
                "--label_letters",
                args.label_letters,
                "非空的大写字母序列",
            ));
        }
        if args.model_name.trim().is_empty() {
            return Err(AppError::invalid_value("--model_name", "", "非空的模型名称"));
        }

        Ok(Self {
            raw_path: args.raw_path,
            output_path: args.output_path,
            model_name: args.model_name,
            reasoning_effort: args.reasoning_effort,
            max_workers: args.max_workers,
            host: args.host,
            port: args.port,
            max_lines: args.max_lines,
            api: args.api,
            profile: args.profile,
            label_letters: args.label_letters,
            temperature: args.temperature,
            timeout: Duration::from_secs(args.timeout_secs),
            verbose: args.verbose,
            api_key: std::env::var("LLM_API_KEY").unwrap_or_else(|_| "EMPTY".to_string()),
        })
    }

    /// 推理服务客户端配置
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            model_name: self.model_name.clone(),
            host: self.host.clone(),
            port: self.port,
            reasoning_effort: self.reasoning_effort,
            verbose: self.verbose,
            timeout: self.timeout,
            api_key: self.api_key.clone(),
            temperature: self.temperature,
        }
    }
}
