//! 以串流複製合併已正規化的片段
//!
//! 合併清單每行一個 `file '<絕對路徑>'`，交給 concat demuxer。
//! 串流複製要求所有輸入的編碼參數一致，所以合併前必須先正規化。

use crate::error::MediaResult;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const MERGE_LIST_NAME: &str = "merge_list.txt";

pub trait Concatenator {
    /// 依清單順序合併到 `output`，外部工具非零結束碼必須回傳錯誤
    fn concat(&self, list_path: &Path, output: &Path) -> MediaResult<()>;
}

/// concat 清單中的單引號寫成 `'\''`
#[must_use]
pub fn escape_list_path(path: &str) -> String {
    path.replace('\'', r"'\''")
}

pub fn write_reference_list(list_path: &Path, clips: &[PathBuf]) -> Result<()> {
    if let Some(parent) = list_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("無法建立目錄: {}", parent.display()))?;
    }

    let file = File::create(list_path)
        .with_context(|| format!("無法建立合併清單: {}", list_path.display()))?;
    let mut writer = BufWriter::new(file);
    for clip in clips {
        let absolute = std::path::absolute(clip)
            .with_context(|| format!("無法取得絕對路徑: {}", clip.display()))?;
        writeln!(
            writer,
            "file '{}'",
            escape_list_path(&absolute.to_string_lossy())
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub struct MergeOrchestrator<'a> {
    concatenator: &'a dyn Concatenator,
}

impl<'a> MergeOrchestrator<'a> {
    #[must_use]
    pub fn new(concatenator: &'a dyn Concatenator) -> Self {
        Self { concatenator }
    }

    /// 沒有片段時回傳 `Ok(None)`；合併失敗一律回傳錯誤
    pub fn merge(&self, clips: &[PathBuf], list_path: &Path, output: &Path) -> Result<Option<PathBuf>> {
        if clips.is_empty() {
            info!("沒有可合併的片段");
            return Ok(None);
        }

        write_reference_list(list_path, clips)?;
        debug!("合併清單: {} ({} 個片段)", list_path.display(), clips.len());

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("無法建立目錄: {}", parent.display()))?;
        }

        self.concatenator.concat(list_path, output)?;
        info!("合併完成: {}", output.display());
        Ok(Some(output.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct RecordingConcatenator {
        fail: bool,
        lists: RefCell<Vec<String>>,
    }

    impl Concatenator for RecordingConcatenator {
        fn concat(&self, list_path: &Path, output: &Path) -> MediaResult<()> {
            self.lists
                .borrow_mut()
                .push(fs::read_to_string(list_path).unwrap_or_default());
            if self.fail {
                return Err(MediaError::Concatenation {
                    output: output.to_path_buf(),
                    reason: "exit status 1".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_escape_list_path() {
        assert_eq!(escape_list_path("/a/b.mp4"), "/a/b.mp4");
        assert_eq!(escape_list_path("/a/it's.mp4"), r"/a/it'\''s.mp4");
    }

    #[test]
    fn test_write_reference_list_uses_absolute_paths() {
        let temp_dir = TempDir::new().unwrap();
        let list_path = temp_dir.path().join(MERGE_LIST_NAME);
        let clips = vec![temp_dir.path().join("one.mp4"), PathBuf::from("rel.mp4")];

        write_reference_list(&list_path, &clips).unwrap();

        let content = fs::read_to_string(&list_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!("file '{}'", temp_dir.path().join("one.mp4").display())
        );
        for line in lines {
            let inner = line.trim_start_matches("file '").trim_end_matches('\'');
            assert!(Path::new(inner).is_absolute());
        }
    }

    #[test]
    fn test_merge_empty_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let concatenator = RecordingConcatenator {
            fail: false,
            lists: RefCell::new(Vec::new()),
        };
        let result = MergeOrchestrator::new(&concatenator)
            .merge(
                &[],
                &temp_dir.path().join(MERGE_LIST_NAME),
                &temp_dir.path().join("out.mp4"),
            )
            .unwrap();

        assert!(result.is_none());
        assert!(concatenator.lists.borrow().is_empty());
    }

    #[test]
    fn test_merge_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let concatenator = RecordingConcatenator {
            fail: false,
            lists: RefCell::new(Vec::new()),
        };
        let clips = vec![temp_dir.path().join("b.mp4"), temp_dir.path().join("a.mp4")];
        let output = temp_dir.path().join("out.mp4");

        let result = MergeOrchestrator::new(&concatenator)
            .merge(&clips, &temp_dir.path().join(MERGE_LIST_NAME), &output)
            .unwrap();

        assert_eq!(result, Some(output));
        let lists = concatenator.lists.borrow();
        let first = lists[0].lines().next().unwrap();
        assert!(first.ends_with("b.mp4'"));
    }

    #[test]
    fn test_merge_failure_is_surfaced() {
        let temp_dir = TempDir::new().unwrap();
        let concatenator = RecordingConcatenator {
            fail: true,
            lists: RefCell::new(Vec::new()),
        };
        let result = MergeOrchestrator::new(&concatenator).merge(
            &[temp_dir.path().join("a.mp4")],
            &temp_dir.path().join(MERGE_LIST_NAME),
            &temp_dir.path().join("out.mp4"),
        );

        let error = result.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<MediaError>(),
            Some(MediaError::Concatenation { .. })
        ));
    }
}
