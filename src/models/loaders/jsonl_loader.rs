use std::path::Path;

use serde_json::{Map, Value};
use tokio::fs;

use crate::config::Profile;
use crate::error::{AppError, AppResult, FileError, RecordError};
use crate::models::record::{ItemIndex, Turn, WorkItem};

/// 从 JSONL 文件加载所有待处理记录
///
/// - 空行会被忽略
/// - `max_lines` 限制读取的原始行数（用于小批量试跑）
/// - 记录索引由 `profile` 决定：按位置编号，或读取 `extra_info.index`
pub async fn load_work_items(
    path: &Path,
    max_lines: Option<usize>,
    profile: Profile,
) -> AppResult<Vec<WorkItem>> {
    if !path.exists() {
        return Err(FileError::NotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    let lines = content.lines().take(max_lines.unwrap_or(usize::MAX));

    let mut items = Vec::new();
    for (line_no, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let position = items.len();
        items.push(parse_line(line, line_no + 1, position, profile)?);
    }

    tracing::info!("从 {} 加载了 {} 条记录", path.display(), items.len());
    Ok(items)
}

/// 解析单行记录
fn parse_line(line: &str, line_no: usize, position: usize, profile: Profile) -> AppResult<WorkItem> {
    let value: Value = serde_json::from_str(line).map_err(|e| RecordError::InvalidLine {
        line: line_no,
        reason: e.to_string(),
    })?;

    let Value::Object(record) = value else {
        return Err(RecordError::InvalidLine {
            line: line_no,
            reason: "顶层不是对象".to_string(),
        }
        .into());
    };

    let index = if profile.explicit_index() {
        explicit_index(&record).ok_or(RecordError::MissingIndex { line: line_no })?
    } else {
        ItemIndex::from(position)
    };

    let turns = parse_turns(record.get(profile.turns_field()));

    Ok(WorkItem {
        index,
        turns,
        record,
    })
}

fn explicit_index(record: &Map<String, Value>) -> Option<ItemIndex> {
    record
        .get("extra_info")
        .and_then(|info| info.get("index"))
        .and_then(|idx| serde_json::from_value(idx.clone()).ok())
}

/// 读取消息列表，格式不符时返回空列表（由流程层决定如何处理）
fn parse_turns(value: Option<&Value>) -> Vec<Turn> {
    match value {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_input(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_positional_index_skips_blank_lines() {
        let file = write_input(&[
            r#"{"input":[{"role":"user","content":"q0"}]}"#,
            "",
            r#"{"input":[{"role":"user","content":"q1"}]}"#,
        ]);

        let items = load_work_items(file.path(), None, Profile::Science)
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].index, ItemIndex::Number(1));
        assert_eq!(items[1].first_user_turn(), Some("q1"));
    }

    #[tokio::test]
    async fn test_max_lines_caps_input() {
        let file = write_input(&[r#"{"input":[]}"#, r#"{"input":[]}"#, r#"{"input":[]}"#]);

        let items = load_work_items(file.path(), Some(2), Profile::Science)
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_explicit_index_for_math_profile() {
        let file = write_input(&[
            r#"{"prompt":[{"role":"user","content":"1+1"}],"extra_info":{"index":41}}"#,
        ]);

        let items = load_work_items(file.path(), None, Profile::Math)
            .await
            .unwrap();

        assert_eq!(items[0].index, ItemIndex::Number(41));
        assert_eq!(items[0].first_user_turn(), Some("1+1"));
    }

    #[tokio::test]
    async fn test_missing_explicit_index_is_fatal() {
        let file = write_input(&[r#"{"prompt":[]}"#]);

        let err = load_work_items(file.path(), None, Profile::Math)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Record(RecordError::MissingIndex { line: 1 })
        ));
    }

    #[tokio::test]
    async fn test_malformed_turns_become_empty() {
        let file = write_input(&[r#"{"input":"not a list"}"#]);

        let items = load_work_items(file.path(), None, Profile::Science)
            .await
            .unwrap();

        assert!(items[0].turns.is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let err = load_work_items(Path::new("/nonexistent/input.jsonl"), None, Profile::Science)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::File(FileError::NotFound { .. })));
    }
}
