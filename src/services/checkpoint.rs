//! 断点服务 - 业务能力层
//!
//! 启动时扫描一次输出文件，得到已完成记录的索引集合。
//! 损坏的行（例如上次崩溃留下的半行）直接跳过，不影响续跑。

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::record::ItemIndex;

/// 已完成索引集合
#[derive(Debug, Default, Clone)]
pub struct CheckpointSet {
    indices: HashSet<ItemIndex>,
    /// 无法解析或缺少索引的行数
    pub skipped_lines: usize,
    /// 重复出现的索引数（说明以前的断点计算有问题）
    pub duplicate_indices: usize,
}

impl CheckpointSet {
    pub fn contains(&self, index: &ItemIndex) -> bool {
        self.indices.contains(index)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &HashSet<ItemIndex> {
        &self.indices
    }
}

#[derive(Deserialize)]
struct CheckpointProbe {
    extra_info: Option<ExtraInfoProbe>,
}

#[derive(Deserialize)]
struct ExtraInfoProbe {
    index: Option<ItemIndex>,
}

/// 断点存储
pub struct CheckpointStore;

impl CheckpointStore {
    /// 扫描输出文件
    ///
    /// 文件不存在时返回空集合。
    pub async fn scan(path: &Path) -> AppResult<CheckpointSet> {
        let mut set = CheckpointSet::default();

        if !path.exists() {
            debug!("输出文件 {} 不存在，从头开始", path.display());
            return Ok(set);
        }

        let file = File::open(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        // 按字节切分：被截断的多字节字符不能让整次扫描失败
        let mut segments = BufReader::new(file).split(b'\n');

        while let Some(segment) = segments
            .next_segment()
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?
        {
            let line = String::from_utf8_lossy(&segment);
            if line.trim().is_empty() {
                continue;
            }
            match parse_index(&line) {
                Some(index) => {
                    if !set.indices.insert(index) {
                        set.duplicate_indices += 1;
                    }
                }
                None => set.skipped_lines += 1,
            }
        }

        if set.skipped_lines > 0 {
            debug!("断点扫描跳过了 {} 行无效记录", set.skipped_lines);
        }
        if set.duplicate_indices > 0 {
            warn!(
                "⚠️ 输出文件 {} 中有 {} 个重复索引",
                path.display(),
                set.duplicate_indices
            );
        }

        Ok(set)
    }
}

fn parse_index(line: &str) -> Option<ItemIndex> {
    serde_json::from_str::<CheckpointProbe>(line)
        .ok()?
        .extra_info?
        .index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_output(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = CheckpointStore::scan(&dir.path().join("absent.jsonl"))
            .await
            .unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_trailing_line_skipped() {
        let file = write_output(concat!(
            "{\"extra_info\":{\"index\":2}}\n",
            "{\"extra_info\":{\"index\":5}}\n",
            "\n",
            "{\"extra_info\":{\"index\":7}}\n",
            "{\"extra_info\":{\"ind",
        ));

        let set = CheckpointStore::scan(file.path()).await.unwrap();

        assert_eq!(set.len(), 3);
        for i in [2u64, 5, 7] {
            assert!(set.contains(&ItemIndex::Number(i)));
        }
        assert_eq!(set.skipped_lines, 1);
    }

    #[tokio::test]
    async fn test_lines_without_index_skipped() {
        let file = write_output(concat!(
            "{\"messages\":[]}\n",
            "{\"extra_info\":{}}\n",
            "[1,2,3]\n",
            "{\"extra_info\":{\"index\":\"q-1\"}}\n",
        ));

        let set = CheckpointStore::scan(file.path()).await.unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.contains(&ItemIndex::Text("q-1".to_string())));
        assert_eq!(set.skipped_lines, 3);
    }

    #[tokio::test]
    async fn test_duplicates_counted() {
        let file = write_output(concat!(
            "{\"extra_info\":{\"index\":1}}\n",
            "{\"extra_info\":{\"index\":1}}\n",
        ));

        let set = CheckpointStore::scan(file.path()).await.unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.duplicate_indices, 1);
    }

    #[tokio::test]
    async fn test_truncated_multibyte_char_skipped() {
        let mut bytes = b"{\"extra_info\":{\"index\":0}}\n{\"text\":\"".to_vec();
        bytes.extend_from_slice(&"题".as_bytes()[..2]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();

        let set = CheckpointStore::scan(file.path()).await.unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.skipped_lines, 1);
    }
}
