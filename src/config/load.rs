use crate::config::types::ScanSettings;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl ScanSettings {
    /// 讀取設定檔；未指定或檔案不存在時使用預設值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            log::warn!("設定檔不存在，使用預設值: {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))
    }
}
