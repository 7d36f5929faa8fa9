//! 外部工具（解碼、渲染、轉檔、合併）的錯誤類型
//!
//! 流程層使用 `anyhow`，只有對外部工具的介面回傳具型別的錯誤，
//! 讓呼叫端可以依錯誤種類決定要略過、替代或中止。

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// 來源影片無法開啟：記錄為 `-` 並略過該影片
    #[error("無法開啟影片 {path}: {reason}")]
    SourceOpen { path: PathBuf, reason: String },

    /// 單一影格讀取失敗（解碼器暫時性錯誤）
    #[error("影格讀取失敗: {0}")]
    FrameRead(String),

    /// 輸出檔案無法建立或寫入
    #[error("無法輸出片段 {path}: {reason}")]
    RenderFailure { path: PathBuf, reason: String },

    #[error("無法取得影片資訊 {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("轉檔失敗 {path}: {reason}")]
    Transcode { path: PathBuf, reason: String },

    /// 合併失敗一律向上回報，不可吞掉
    #[error("合併失敗 {output}: {reason}")]
    Concatenation { output: PathBuf, reason: String },
}

impl MediaError {
    pub fn source_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn render(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::RenderFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;
