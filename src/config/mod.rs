pub mod file_type;
pub mod load;
pub mod save;
pub mod types;

pub use file_type::{VIDEO_EXTENSIONS, is_video_file};
pub use save::save_settings;
pub use types::{
    FailurePolicy, OverlayAnchor, OverlaySettings, Resolution, ResumeMode, ScanSettings,
    Verbosity, parse_class_ids, parse_color,
};
