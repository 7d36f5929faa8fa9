use crate::config::types::ScanSettings;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 將目前生效的設定寫成 JSON，可供下次以 `--config` 載入
pub fn save_settings(path: &Path, settings: &ScanSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("無法建立目錄: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write settings to {}", path.display()))?;

    Ok(())
}
