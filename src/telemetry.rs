//! 日志与追踪系统

use crate::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化日志系统
///
/// `RUST_LOG` 优先于配置中的日志级别。重复初始化（例如多个测试共用进程）不会 panic。
pub fn init_telemetry(config: &AppConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .boxed(),
    };

    let initialized = tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .try_init()
        .is_ok();

    if initialized {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            level = %config.logging.level,
            format = %config.logging.format,
            "Telemetry initialized"
        );
    }
}
