//! 结果写入服务 - 业务能力层
//!
//! 只负责"把一条完成的记录追加到输出文件"，不关心流程

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, AppResult, FileError};

/// 结果写入服务
///
/// 职责：
/// - 以追加模式打开输出文件，已有内容永不改写
/// - 每次写入一整行 JSON 并立即 flush
/// - 所有 worker 共享同一把锁，行与行之间不会交错
pub struct RecordWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl RecordWriter {
    /// 打开（或创建）输出文件，必要时创建上级目录
    pub async fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FileError::CreateDirFailed {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        // 上次崩溃可能留下没有换行的半行，先补一个换行，避免新记录粘在后面
        if ends_without_newline(&mut file)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?
        {
            file.write_all(b"\n")
                .await
                .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        }

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条记录
    pub async fn append(&self, record: &Value) -> AppResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::file_write_failed(self.path.display().to_string(), e))?;
        file.flush()
            .await
            .map_err(|e| AppError::file_write_failed(self.path.display().to_string(), e))?;

        debug!("写入记录: {} 字节", line.len());
        Ok(())
    }
}

async fn ends_without_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1)).await?;
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_append_creates_parent_and_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.jsonl");

        let writer = RecordWriter::open(&path).await.unwrap();
        writer.append(&json!({"extra_info": {"index": 0}})).await.unwrap();
        drop(writer);

        let writer = RecordWriter::open(&path).await.unwrap();
        writer.append(&json!({"extra_info": {"index": 1}})).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"index\":0"));
        assert!(lines[1].contains("\"index\":1"));
    }

    #[tokio::test]
    async fn test_open_terminates_truncated_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        std::fs::write(&path, "{\"extra_info\":{\"index\":0}}\n{\"extra_info\":{\"ind").unwrap();

        let writer = RecordWriter::open(&path).await.unwrap();
        writer.append(&json!({"extra_info": {"index": 1}})).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "{\"extra_info\":{\"index\":1}}");
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let writer = Arc::new(RecordWriter::open(&path).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..50 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                let payload = "x".repeat(4096);
                writer
                    .append(&json!({"payload": payload, "extra_info": {"index": i}}))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let mut seen = Vec::new();
        for line in content.lines() {
            let value: Value = serde_json::from_str(line).unwrap();
            seen.push(value["extra_info"]["index"].as_u64().unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<u64>>());
    }
}
