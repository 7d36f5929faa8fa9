use crate::config::Verbosity;
use env_logger::Env;

const fn default_filter(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "debug",
    }
}

/// 初始化日誌，`RUST_LOG` 優先於 `verbosity`
pub fn init(verbosity: Verbosity) {
    let env = Env::default().default_filter_or(default_filter(verbosity));
    // 重複初始化（例如測試）時忽略
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(Verbosity::Quiet), "error");
        assert_eq!(default_filter(Verbosity::Normal), "warn");
        assert_eq!(default_filter(Verbosity::Verbose), "debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(Verbosity::Normal);
        init(Verbosity::Verbose);
    }
}
