use thiserror::Error;

use crate::models::record::ItemIndex;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 推理服务 API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 数据记录错误
    #[error("记录错误: {0}")]
    Record(#[from] RecordError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 调度器已关闭
    #[error("调度错误: {0}")]
    Scheduler(#[from] tokio::sync::AcquireError),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 流式响应在 [DONE] 之前中断
    #[error("流式响应中断 ({endpoint})")]
    StreamTruncated { endpoint: String },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: serde_json::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 创建目录失败
    #[error("创建目录失败 ({path}): {source}")]
    CreateDirFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 返回结果中既没有推理也没有回答
    #[error("LLM返回结果为空 (模型: {model})")]
    EmptyResponse { model: String },
    /// 构造请求消息失败
    #[error("构造请求消息失败: {source}")]
    MessageBuildFailed {
        #[source]
        source: async_openai::error::OpenAIError,
    },
}

/// 数据记录错误
#[derive(Debug, Error)]
pub enum RecordError {
    /// 记录中没有 role 为 user 的消息
    #[error("记录 {index} 中没有 user 消息")]
    MissingUserTurn { index: ItemIndex },
    /// 记录缺少 extra_info.index
    #[error("第 {line} 行缺少 extra_info.index")]
    MissingIndex { line: usize },
    /// 输入行不是 JSON 对象
    #[error("第 {line} 行不是合法的 JSON 对象: {reason}")]
    InvalidLine { line: usize, reason: String },
    /// 单条记录处理时发生 panic
    #[error("处理过程中发生 panic: {message}")]
    Panicked { message: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 参数值不合法
    #[error("参数 {name} 的值 '{value}' 不合法: 期望 {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },
    /// 正则表达式编译失败
    #[error("规则 {rule} 的正则表达式无法编译: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
    /// HTTP 客户端构建失败
    #[error("HTTP客户端构建失败: {source}")]
    HttpClientFailed {
        #[source]
        source: reqwest::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed { source: err })
    }
}

impl From<async_openai::error::OpenAIError> for AppError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        AppError::Llm(LlmError::MessageBuildFailed { source: err })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建参数不合法错误
    pub fn invalid_value(
        name: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        AppError::Config(ConfigError::InvalidValue {
            name: name.into(),
            value: value.into(),
            expected: expected.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
