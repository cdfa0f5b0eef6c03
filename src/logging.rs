//! Diagnostics for the `capsuleos` binary.
//!
//! Every line goes to stderr so `capsuleos search --json` keeps stdout clean.
//! Warnings carry short targets: `store` for unreadable documents, `index` for
//! skipped files, `watcher` for failed reconcile passes and `http` for
//! request failures. `log_event!` lines use the module path
//! (`capsuleos::watcher::reconciler` and so on). A set `RUST_LOG` replaces
//! `[logging]` entirely.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! index = "error"
//! capsuleos = "info"
//! ```
//!
//! ```bash
//! RUST_LOG=capsuleos::watcher=info capsuleos serve
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// `EnvFilter` directives for `[logging]`: the default level, then one
/// `target=level` per module override in sorted order.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    let mut filter = config.default.clone();
    for (module, level) in modules {
        filter.push_str(&format!(",{module}={level}"));
    }
    filter
}

/// Install the stderr subscriber for `serve` and the one-shot commands.
///
/// The CLI calls this before dispatch; later calls are ignored.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("store", "created", "{}", path.display());
/// log_event!("watcher", "stopped");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("index", "skipped", "{}", item_id);
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        let mut config = LoggingConfig::default();
        assert_eq!(filter_directives(&config), "warn");

        config.modules.insert("watcher".into(), "info".into());
        config.modules.insert("index".into(), "debug".into());
        assert_eq!(filter_directives(&config), "warn,index=debug,watcher=info");
    }
}
