pub mod chat_stream_client;
pub mod llm_client;
pub mod responses_client;

pub use chat_stream_client::ChatStreamClient;
pub use llm_client::{build_backend, BackendConfig, ResponseBackend};
pub use responses_client::ResponsesClient;
