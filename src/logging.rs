use tracing_subscriber::{fmt, EnvFilter};

/// 默认日志级别（未设置 RUST_LOG 时）
const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// 初始化 tracing 日志系统（控制台输出）
///
/// 已经安装过全局 subscriber 时会 panic，嵌入方请用 [`try_init`]。
pub fn init() {
    fmt().with_env_filter(env_filter()).init(); // 输出到 stderr
    tracing::info!("日志系统初始化完成");
}

/// 初始化日志系统；已经初始化过时返回错误而不是 panic
pub fn try_init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    fmt().with_env_filter(env_filter()).try_init()?;
    tracing::debug!("日志系统初始化完成");
    Ok(())
}
