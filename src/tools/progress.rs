use indicatif::{ProgressBar, ProgressStyle};

pub const BATCH_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} 支影片 {msg}";
pub const FRAME_TEMPLATE: &str =
    "  [{bar:40.green/white}] {pos}/{len} 格 ({per_sec}, {eta}) {msg}";
const SPINNER_TEMPLATE: &str = "  {spinner:.green} {pos} 格 ({per_sec}) {msg}";

#[must_use]
pub fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// 長度未知時改用 spinner
#[must_use]
pub fn new_progress_bar(len: u64, template: &str) -> ProgressBar {
    if len == 0 {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        return bar;
    }
    let bar = ProgressBar::new(len);
    bar.set_style(bar_style(template));
    bar
}
